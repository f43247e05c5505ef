//! ksync route - main-table route management.

use std::net::Ipv4Addr;

use clap::{Args, Subcommand};
use kernsync::util::addr::parse_prefix;
use kernsync::{RouteDescriptor, RouteOrigin, Transport};

use super::resolve_port;
use crate::output::{OutputFormat, print_all};

#[derive(Args)]
pub struct RouteCmd {
    #[command(subcommand)]
    action: Option<RouteAction>,
}

#[derive(Subcommand)]
enum RouteAction {
    /// List routes.
    #[command(visible_alias = "list", visible_alias = "ls")]
    Show {
        /// Only routes out of this device.
        #[arg(long)]
        dev: Option<String>,
    },

    /// Add a route.
    Add {
        #[command(flatten)]
        target: RouteTarget,

        /// Preferred source address.
        #[arg(long)]
        src: Option<Ipv4Addr>,

        #[arg(long)]
        metric: Option<u32>,

        /// Route origin (static, zebra, boot, kernel).
        #[arg(long, default_value = "static")]
        proto: RouteOrigin,
    },

    /// Remove a route.
    #[command(visible_alias = "delete")]
    Del {
        #[command(flatten)]
        target: RouteTarget,
    },
}

#[derive(Args)]
struct RouteTarget {
    /// Destination prefix, or "default".
    destination: String,

    /// Gateway address.
    #[arg(long)]
    via: Option<Ipv4Addr>,

    /// Outgoing device.
    #[arg(long)]
    dev: Option<String>,
}

impl RouteTarget {
    async fn descriptor(&self, transport: &Transport) -> anyhow::Result<RouteDescriptor> {
        let (destination, prefix_length) = parse_prefix(&self.destination)?;
        let mut route = RouteDescriptor::new(destination, prefix_length);
        if let Some(via) = self.via {
            route = route.gateway(via);
        }
        if let Some(dev) = &self.dev {
            route = route.port(resolve_port(transport, dev).await?);
        }
        Ok(route)
    }
}

impl RouteCmd {
    pub async fn run(self, transport: &Transport, format: OutputFormat) -> anyhow::Result<()> {
        match self.action.unwrap_or(RouteAction::Show { dev: None }) {
            RouteAction::Show { dev } => {
                let index = match dev {
                    Some(dev) => Some(resolve_port(transport, &dev).await?),
                    None => None,
                };
                let mut routes = transport.dump_routes().await?;
                if let Some(index) = index {
                    routes.retain(|r| r.port_index == index);
                }
                routes.sort_by_key(|r| (r.prefix_length, r.destination));
                print_all(&routes, format)
            }
            RouteAction::Add {
                target,
                src,
                metric,
                proto,
            } => {
                if target.via.is_none() && target.dev.is_none() {
                    anyhow::bail!("a route needs --via or --dev");
                }
                let mut route = target.descriptor(transport).await?.origin(proto);
                if let Some(src) = src {
                    route = route.source(src);
                }
                if let Some(metric) = metric {
                    route = route.metric(metric);
                }
                transport.add_route(route).await?;
                Ok(())
            }
            RouteAction::Del { target } => {
                let route = target.descriptor(transport).await?;
                transport.remove_route(route).await?;
                Ok(())
            }
        }
    }
}
