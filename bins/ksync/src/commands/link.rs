//! ksync link - create, delete and toggle network devices.

use anyhow::Context;
use clap::{Args, Subcommand};
use kernsync::util::ifname;
use kernsync::{MacAddress, Transport};

use super::resolve_port;
use crate::output::{OutputFormat, print_all};

#[derive(Args)]
pub struct LinkCmd {
    #[command(subcommand)]
    action: Option<LinkAction>,
}

#[derive(Subcommand)]
enum LinkAction {
    /// List links.
    #[command(visible_alias = "list", visible_alias = "ls")]
    Show {
        /// Only this device.
        dev: Option<String>,
    },

    /// Create a virtual link.
    Add {
        name: String,

        /// Link kind (dummy, bridge, bond, veth, ...).
        #[arg(long = "type", short = 't', default_value = "dummy")]
        kind: String,

        /// Hardware address.
        #[arg(long)]
        address: Option<MacAddress>,

        #[arg(long)]
        mtu: Option<u32>,
    },

    /// Create an 802.1Q VLAN on top of another link.
    Vlan {
        name: String,

        /// Lower device.
        #[arg(long)]
        link: String,

        /// VLAN tag.
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..4095))]
        id: u16,
    },

    /// Delete a link.
    #[command(visible_alias = "delete")]
    Del { dev: String },

    /// Set a link administratively up.
    Up { dev: String },

    /// Set a link administratively down.
    Down { dev: String },

    /// Enslave a link to a bridge or bond.
    Master { dev: String, master: String },

    /// Release a link from its master.
    Nomaster { dev: String },
}

impl LinkCmd {
    pub async fn run(self, transport: &Transport, format: OutputFormat) -> anyhow::Result<()> {
        match self.action.unwrap_or(LinkAction::Show { dev: None }) {
            LinkAction::Show { dev } => show(transport, dev.as_deref(), format).await,
            LinkAction::Add {
                name,
                kind,
                address,
                mtu,
            } => {
                ifname::validate(&name)?;
                transport
                    .add_link(&kind, &name, address, mtu)
                    .await
                    .with_context(|| format!("adding {} link {}", kind, name))?;
                Ok(())
            }
            LinkAction::Vlan { name, link, id } => {
                ifname::validate(&name)?;
                let lower = resolve_port(transport, &link).await?;
                transport.add_vlan(id, lower, &name).await?;
                Ok(())
            }
            LinkAction::Del { dev } => {
                let index = resolve_port(transport, &dev).await?;
                transport.delete_link(index).await?;
                Ok(())
            }
            LinkAction::Up { dev } => {
                let index = resolve_port(transport, &dev).await?;
                transport.set_port_up(index).await?;
                Ok(())
            }
            LinkAction::Down { dev } => {
                let index = resolve_port(transport, &dev).await?;
                transport.set_port_down(index).await?;
                Ok(())
            }
            LinkAction::Master { dev, master } => {
                let index = resolve_port(transport, &dev).await?;
                let master = resolve_port(transport, &master).await?;
                transport.enslave(index, master).await?;
                Ok(())
            }
            LinkAction::Nomaster { dev } => {
                let index = resolve_port(transport, &dev).await?;
                transport.release(index).await?;
                Ok(())
            }
        }
    }
}

async fn show(transport: &Transport, dev: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
    let mut links = transport.dump_links().await?;
    if let Some(dev) = dev {
        let index = dev.parse::<u32>().ok();
        links.retain(|p| p.name() == dev || Some(p.index()) == index);
        if links.is_empty() {
            anyhow::bail!("cannot find device \"{}\"", dev);
        }
    }
    links.sort_by_key(|p| p.index());
    print_all(&links, format)
}
