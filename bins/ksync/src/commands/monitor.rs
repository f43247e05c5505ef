//! ksync monitor - print kernel change notifications as they arrive.

use clap::{Args, ValueEnum};
use kernsync::{Error, KernelEvent, Transport};
use tokio_stream::StreamExt;

use crate::output::{OutputFormat, print_one};

#[derive(Args)]
pub struct MonitorCmd {
    /// Object classes to watch. All when empty.
    #[arg(value_enum)]
    objects: Vec<EventClass>,

    /// Exit after this many events.
    #[arg(short, long)]
    count: Option<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventClass {
    Link,
    Address,
    Route,
}

impl EventClass {
    fn matches(self, event: &KernelEvent) -> bool {
        match self {
            EventClass::Link => event.is_link(),
            EventClass::Address => event.is_address(),
            EventClass::Route => event.is_route(),
        }
    }
}

impl MonitorCmd {
    fn wants(&self, event: &KernelEvent) -> bool {
        self.objects.is_empty() || self.objects.iter().any(|class| class.matches(event))
    }

    pub async fn run(self, transport: &Transport, format: OutputFormat) -> anyhow::Result<()> {
        let mut events = transport.subscribe().into_stream();
        let mut seen = 0usize;

        loop {
            let item = tokio::select! {
                item = events.next() => item,
                _ = tokio::signal::ctrl_c() => break,
            };
            let Some(item) = item else { break };

            let event = match item {
                Ok(event) => event,
                Err(Error::Lagged(n)) => {
                    tracing::warn!("monitor fell behind, {} events dropped", n);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if !self.wants(&event) {
                continue;
            }
            print_one(&event, format)?;

            seen += 1;
            if self.count.is_some_and(|count| seen >= count) {
                break;
            }
        }

        Ok(())
    }
}
