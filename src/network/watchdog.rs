//! # Successor watchdog
//!
//! Watches the heartbeats of this node's ring successor, independently of the peer listener,
//! so a dead successor is noticed within [`config::WATCHDOG_TIMEOUT`].
//!
//! The supervisor owns a chain of watchers. The first watches the next ID after self. When the
//! last watcher in the chain sees its node go silent, a watcher for the ID after that one is
//! added, so the chain always reaches the first live successor. When a node in the chain comes
//! back, every watcher behind it is stopped, and the supervisor waits for each of them to
//! finish before going on.
//!
//! [`WatchChain`] holds the chain logic; [`start_watchdog`] runs it.

use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{self, ElevConfig};
use crate::print;
use crate::world_view::NodeId;
use super::udp_broadcast::{broadcast_socket, parse_heartbeat};

/// What the watchdog tells the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// A watched node went silent.
    Lost(NodeId),
    /// A watched node is heard again.
    Alive(NodeId),
}

/// Change to the set of running watchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainChange {
    None,
    /// Start watching this node.
    Extend(NodeId),
    /// Stop watching these nodes.
    Truncate(Vec<NodeId>),
}

/// The chain of watched nodes, nearest successor first.
#[derive(Debug, Clone)]
pub struct WatchChain {
    self_id: NodeId,
    num_nodes: u8,
    chain: Vec<NodeId>,
}

impl WatchChain {
    pub fn new(self_id: NodeId, num_nodes: u8) -> Self {
        let mut chain = Self { self_id, num_nodes, chain: Vec::new() };
        if let Some(first) = chain.after(self_id) {
            chain.chain.push(first);
        }
        chain
    }

    /// Nodes currently watched, nearest first.
    pub fn watched(&self) -> &[NodeId] {
        &self.chain
    }

    /// The ID after `id` in ring order, unless that wraps back to self.
    fn after(&self, id: NodeId) -> Option<NodeId> {
        let next = ((id as u16 + 1) % self.num_nodes.max(1) as u16) as NodeId;
        (next != self.self_id).then_some(next)
    }

    /// `id` went silent.
    pub fn on_dead(&mut self, id: NodeId) -> ChainChange {
        if self.chain.last() != Some(&id) {
            return ChainChange::None;
        }
        match self.after(id) {
            Some(next) => {
                self.chain.push(next);
                ChainChange::Extend(next)
            }
            None => ChainChange::None,
        }
    }

    /// `id` is heard again.
    pub fn on_alive(&mut self, id: NodeId) -> ChainChange {
        let Some(pos) = self.chain.iter().position(|&w| w == id) else {
            return ChainChange::None;
        };
        let behind = self.chain.split_off(pos + 1);
        if behind.is_empty() {
            ChainChange::None
        } else {
            ChainChange::Truncate(behind)
        }
    }
}

struct Watcher {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Reports from one watcher: `true` when its node is heard, `false` when it goes silent.
type WatcherReport = (NodeId, bool);

fn spawn_watcher(config: &ElevConfig, id: NodeId, report_tx: mpsc::Sender<WatcherReport>) -> Watcher {
    let (stop_tx, stop_rx) = oneshot::channel();
    let port = config.broadcast_port;
    let handle = tokio::spawn(async move {
        if let Err(e) = watch_node(port, id, report_tx, stop_rx).await {
            print::err(format!("Watcher for node {} failed: {}", id, e));
        }
    });
    Watcher { stop_tx, handle }
}

/// Listens for `id`'s heartbeats until told to stop, reporting every change between heard
/// and silent. The first report is whichever comes first.
async fn watch_node(
    port: u16,
    id: NodeId,
    report_tx: mpsc::Sender<WatcherReport>,
    mut stop_rx: oneshot::Receiver<()>,
) -> std::io::Result<()> {
    let socket = broadcast_socket(port)?;
    let mut buf = vec![0u8; config::UDP_BUFFER];
    let wanted = id.to_string();
    let mut alive: Option<bool> = None;
    let mut last_heard = time::Instant::now();

    loop {
        tokio::select! {
            _ = &mut stop_rx => return Ok(()),
            received = time::timeout(config::WATCHDOG_TIMEOUT, socket.recv_from(&mut buf)) => {
                if let Ok(Ok((len, _))) = received {
                    if parse_heartbeat(&buf[..len]).as_deref() == Some(wanted.as_str()) {
                        last_heard = time::Instant::now();
                    }
                }
            }
        }

        let heard = last_heard.elapsed() <= config::WATCHDOG_TIMEOUT;
        if alive != Some(heard) {
            alive = Some(heard);
            if report_tx.send((id, heard)).await.is_err() {
                return Ok(());
            }
        }
    }
}

/// Runs the watchdog supervisor forever, reporting on `event_tx`.
///
/// ## Note
/// This function is permanently blocking, and should be called asynchronously
pub async fn start_watchdog(config: ElevConfig, event_tx: mpsc::Sender<WatchdogEvent>) -> anyhow::Result<()> {
    let (report_tx, mut report_rx) = mpsc::channel::<WatcherReport>(config::CHANNEL_SIZE);
    let mut chain = WatchChain::new(config.node_id, config.num_nodes);
    let mut watchers: HashMap<NodeId, Watcher> = HashMap::new();

    for &id in chain.watched() {
        watchers.insert(id, spawn_watcher(&config, id, report_tx.clone()));
    }

    while let Some((id, heard)) = report_rx.recv().await {
        // stale report from a watcher that is being torn down
        if !watchers.contains_key(&id) {
            continue;
        }

        let (change, event) = if heard {
            (chain.on_alive(id), WatchdogEvent::Alive(id))
        } else {
            (chain.on_dead(id), WatchdogEvent::Lost(id))
        };

        match change {
            ChainChange::Extend(next) => {
                watchers.insert(next, spawn_watcher(&config, next, report_tx.clone()));
            }
            ChainChange::Truncate(stale) => {
                for stale_id in stale {
                    if let Some(watcher) = watchers.remove(&stale_id) {
                        let _ = watcher.stop_tx.send(());
                        if let Err(e) = watcher.handle.await {
                            print::err(format!("Watcher for node {} did not stop cleanly: {}", stale_id, e));
                        }
                    }
                }
            }
            ChainChange::None => {}
        }

        if event_tx.send(event).await.is_err() {
            break;
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_starts_at_next_id() {
        assert_eq!(WatchChain::new(1, 4).watched(), &[2]);
        assert_eq!(WatchChain::new(3, 4).watched(), &[0]);
        assert!(WatchChain::new(0, 1).watched().is_empty());
    }

    #[test]
    fn dead_tail_extends_chain_until_self() {
        let mut chain = WatchChain::new(0, 3);
        assert_eq!(chain.on_dead(1), ChainChange::Extend(2));
        assert_eq!(chain.watched(), &[1, 2]);
        // wraps back to self: nothing more to watch
        assert_eq!(chain.on_dead(2), ChainChange::None);
        assert_eq!(chain.watched(), &[1, 2]);
    }

    #[test]
    fn dead_node_inside_chain_changes_nothing() {
        let mut chain = WatchChain::new(0, 4);
        chain.on_dead(1);
        assert_eq!(chain.on_dead(1), ChainChange::None);
        assert_eq!(chain.watched(), &[1, 2]);
    }

    #[test]
    fn revival_tears_down_watchers_behind() {
        let mut chain = WatchChain::new(0, 4);
        chain.on_dead(1);
        chain.on_dead(2);
        assert_eq!(chain.watched(), &[1, 2, 3]);

        assert_eq!(chain.on_alive(1), ChainChange::Truncate(vec![2, 3]));
        assert_eq!(chain.watched(), &[1]);
        assert_eq!(chain.on_alive(1), ChainChange::None);
    }
}
