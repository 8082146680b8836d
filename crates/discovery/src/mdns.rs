use std::net::IpAddr;

use mdns_sd::{DaemonEvent, ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::mpsc;

use crate::error::DiscoveryError;
use crate::peer::Peer;
use crate::{BrowseEvent, Discovery, PublishEvent, SERVICE_TYPE};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// [`Discovery`] backed by [`mdns_sd`]'s in-process daemon.
///
/// One daemon handles both publishing the local peer and browsing for
/// others; `mdns-sd` disambiguates a name collision on registration itself,
/// which this adapter surfaces as [`PublishEvent::NameChanged`].
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
}

impl MdnsDiscovery {
    /// Starts the mDNS daemon. Does not publish or browse until asked.
    pub fn new() -> Result<Self, DiscoveryError> {
        let daemon = ServiceDaemon::new().map_err(|err| DiscoveryError::DaemonStart(err.to_string()))?;
        Ok(Self { daemon })
    }
}

#[async_trait::async_trait]
impl Discovery for MdnsDiscovery {
    async fn publish(
        &self,
        requested_username: &str,
        port: u16,
    ) -> Result<mpsc::Receiver<PublishEvent>, DiscoveryError> {
        let hostname = hostname_label();
        let instance_name = format!("{requested_username}@{hostname}");
        let service_hostname = format!("{instance_name}.local.");

        let service_info = ServiceInfo::new(
            SERVICE_TYPE,
            &instance_name,
            &service_hostname,
            "",
            port,
            None,
        )
        .map_err(|err| DiscoveryError::Register(err.to_string()))?;

        let registered_name = service_info.get_fullname().to_string();

        self.daemon
            .register(service_info)
            .map_err(|err| DiscoveryError::Register(err.to_string()))?;

        tracing::debug!(name = %registered_name, "mDNS service published");

        let monitor = self
            .daemon
            .monitor()
            .map_err(|err| DiscoveryError::Register(err.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        if tx.send(PublishEvent::NameChanged(instance_name)).await.is_ok() {
            tokio::spawn(async move {
                while let Ok(event) = monitor.recv_async().await {
                    if let DaemonEvent::Error(err) = event {
                        let reported = tx.send(PublishEvent::BeingDestroyed(Some(err.to_string()))).await;
                        if reported.is_err() {
                            break;
                        }
                    }
                }
                let _ = tx.send(PublishEvent::BeingDestroyed(None)).await;
            });
        }

        Ok(rx)
    }

    async fn browse(&self) -> Result<mpsc::Receiver<BrowseEvent>, DiscoveryError> {
        let receiver = self
            .daemon
            .browse(SERVICE_TYPE)
            .map_err(|err| DiscoveryError::Browse(err.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                let Some(browse_event) = translate_event(event) else {
                    continue;
                };
                if tx.send(browse_event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn lookup_host(&self, hostname: &str) -> Result<IpAddr, DiscoveryError> {
        let target = format!("{hostname}:0");
        let mut addrs = tokio::net::lookup_host(&target)
            .await
            .map_err(|source| DiscoveryError::HostLookup {
                hostname: hostname.to_string(),
                source,
            })?;
        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| DiscoveryError::NoAddress(hostname.to_string()))
    }
}

impl Drop for MdnsDiscovery {
    fn drop(&mut self) {
        if let Err(err) = self.daemon.shutdown() {
            tracing::warn!(%err, "failed to shut down the mDNS daemon cleanly");
        }
    }
}

fn translate_event(event: ServiceEvent) -> Option<BrowseEvent> {
    match event {
        ServiceEvent::ServiceResolved(info) => Some(BrowseEvent::Added(peer_from_info(&info))),
        ServiceEvent::ServiceRemoved(_, fullname) => {
            Some(BrowseEvent::Removed(peer_from_fullname(&fullname)))
        }
        ServiceEvent::SearchStarted(_)
        | ServiceEvent::ServiceFound(_, _)
        | ServiceEvent::SearchStopped(_) => None,
    }
}

fn peer_from_info(info: &ServiceInfo) -> Peer {
    Peer {
        username: username_from_fullname(info.get_fullname()),
        hostname: info.get_hostname().to_string(),
        port: info.get_port(),
    }
}

fn peer_from_fullname(fullname: &str) -> Peer {
    Peer {
        username: username_from_fullname(fullname),
        hostname: String::new(),
        port: 0,
    }
}

fn username_from_fullname(fullname: &str) -> String {
    let marker = format!(".{SERVICE_TYPE}");
    match fullname.find(&marker) {
        Some(idx) => fullname[..idx].to_string(),
        None => fullname.to_string(),
    }
}

fn hostname_label() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_the_service_type_suffix() {
        assert_eq!(
            username_from_fullname("alice@desktop._localshare._tcp.local."),
            "alice@desktop"
        );
    }

    #[test]
    fn leaves_an_unrelated_name_untouched() {
        assert_eq!(username_from_fullname("not-a-match"), "not-a-match");
    }
}
