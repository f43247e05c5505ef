//! ksync address - IPv4 address management.

use clap::{Args, Subcommand};
use kernsync::util::addr::parse_prefix;
use kernsync::{AddressDescriptor, Transport};

use super::resolve_port;
use crate::output::{OutputFormat, print_all};

#[derive(Args)]
pub struct AddressCmd {
    #[command(subcommand)]
    action: Option<AddressAction>,
}

#[derive(Subcommand)]
enum AddressAction {
    /// List addresses.
    #[command(visible_alias = "list", visible_alias = "ls")]
    Show {
        /// Only addresses on this device.
        #[arg(long)]
        dev: Option<String>,
    },

    /// Add an address (ADDRESS/PREFIX).
    Add {
        address: String,

        #[arg(long)]
        dev: String,
    },

    /// Remove an address (ADDRESS/PREFIX).
    #[command(visible_alias = "delete")]
    Del {
        address: String,

        #[arg(long)]
        dev: String,
    },
}

impl AddressCmd {
    pub async fn run(self, transport: &Transport, format: OutputFormat) -> anyhow::Result<()> {
        match self.action.unwrap_or(AddressAction::Show { dev: None }) {
            AddressAction::Show { dev } => {
                let index = match dev {
                    Some(dev) => Some(resolve_port(transport, &dev).await?),
                    None => None,
                };
                let mut addresses = transport.dump_addresses().await?;
                if let Some(index) = index {
                    addresses.retain(|a| a.port_index == index);
                }
                addresses.sort_by_key(|a| (a.port_index, a.address));
                print_all(&addresses, format)
            }
            AddressAction::Add { address, dev } => {
                let descriptor = descriptor(transport, &address, &dev).await?;
                transport.add_address(descriptor).await?;
                Ok(())
            }
            AddressAction::Del { address, dev } => {
                let descriptor = descriptor(transport, &address, &dev).await?;
                transport.remove_address(descriptor).await?;
                Ok(())
            }
        }
    }
}

async fn descriptor(
    transport: &Transport,
    address: &str,
    dev: &str,
) -> anyhow::Result<AddressDescriptor> {
    let (address, prefix_length) = parse_prefix(address)?;
    let index = resolve_port(transport, dev).await?;
    Ok(AddressDescriptor::new(address, prefix_length, index))
}
