use std::collections::VecDeque;

use log::{debug, trace};
use thiserror::Error;

use crate::computer::{Computer, ComputerConfig};
use crate::error::Fault;
use crate::program::Program;

/// Input a node reads when its inbox is empty.
pub const NO_PACKET: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub dest: i64,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("node {node} faulted: {source}")]
    Node {
        node: usize,
        #[source]
        source: Fault,
    },

    #[error("no result after {ticks} ticks")]
    Stalled { ticks: usize },

    #[error("network idle with nothing for the monitor to resend")]
    Deadlocked,
}

/// Configuration for a packet network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of nodes; node `i` boots with address `i`.
    pub size: usize,
    /// Address watched by the NAT monitor.
    pub nat_address: i64,
    /// Consecutive quiet ticks before the network counts as idle.
    pub idle_ticks: usize,
    /// Ticks a driver loop may take before giving up.
    pub max_ticks: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            size: 50,
            nat_address: 255,
            idle_ticks: 2,
            max_ticks: 1 << 16,
        }
    }
}

struct Node {
    computer: Computer,
    inbox: VecDeque<(i64, i64)>,
    /// Outputs of a packet still being emitted.
    partial: Vec<i64>,
}

/// A set of computers exchanging three-value packets `(dest, x, y)`.
///
/// The network is driven by [`Network::tick`], which gives every live node
/// one `run` in address order. A node that starves is fed its next queued
/// packet, or [`NO_PACKET`] if none is waiting. Packets addressed outside
/// the network are returned to the caller.
pub struct Network {
    nodes: Vec<Node>,
    config: NetworkConfig,
    ticks: usize,
    quiet: usize,
}

impl Network {
    pub fn new(program: &Program, config: NetworkConfig) -> Self {
        let nodes = (0..config.size)
            .map(|address| {
                let mut computer =
                    Computer::with_config(program.clone(), ComputerConfig::blocking());
                computer.push_input(address as i64);
                Node {
                    computer,
                    inbox: VecDeque::new(),
                    partial: Vec::with_capacity(3),
                }
            })
            .collect();
        Self {
            nodes,
            config,
            ticks: 0,
            quiet: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn node(&self, address: usize) -> Option<&Computer> {
        self.nodes.get(address).map(|n| &n.computer)
    }

    /// Queue a packet for the node at `packet.dest`. Returns the packet
    /// back if no such node exists.
    pub fn deliver(&mut self, packet: Packet) -> Option<Packet> {
        match usize::try_from(packet.dest).ok().and_then(|d| self.nodes.get_mut(d)) {
            Some(node) => {
                trace!("deliver {packet:?}");
                node.inbox.push_back((packet.x, packet.y));
                None
            }
            None => Some(packet),
        }
    }

    /// True when the last `idle_ticks` ticks sent nothing, every inbox is
    /// empty and every live node is waiting for input.
    pub fn is_idle(&self) -> bool {
        self.quiet >= self.config.idle_ticks
            && self.nodes.iter().all(|n| {
                n.computer.is_halted()
                    || (n.inbox.is_empty() && n.partial.is_empty() && n.computer.needs_input())
            })
    }

    /// Give every live node one turn. Returns the packets addressed outside
    /// the network; packets between nodes are queued internally.
    pub fn tick(&mut self) -> Result<Vec<Packet>, NetworkError> {
        self.ticks += 1;
        let mut sent = 0;
        let mut external = Vec::new();
        for address in 0..self.nodes.len() {
            let node = &mut self.nodes[address];
            if node.computer.is_halted() {
                continue;
            }
            if node.computer.needs_input() {
                match node.inbox.pop_front() {
                    Some((x, y)) => {
                        node.computer.push_input(x);
                        node.computer.push_input(y);
                    }
                    None => node.computer.push_input(NO_PACKET),
                }
            }
            let output = node
                .computer
                .run([])
                .map_err(|source| NetworkError::Node { node: address, source })?;
            let Some(value) = output else { continue };
            node.partial.push(value);
            if node.partial.len() < 3 {
                continue;
            }
            let packet = Packet {
                dest: node.partial[0],
                x: node.partial[1],
                y: node.partial[2],
            };
            node.partial.clear();
            sent += 1;
            debug!("node {address} sent {packet:?}");
            if let Some(packet) = self.deliver(packet) {
                external.push(packet);
            }
        }
        self.quiet = if sent == 0 { self.quiet + 1 } else { 0 };
        Ok(external)
    }

    /// Run until a packet is sent to `dest`, which must lie outside the
    /// network, and return it.
    pub fn run_until_packet_to(&mut self, dest: i64) -> Result<Packet, NetworkError> {
        let start = self.ticks;
        while self.ticks - start < self.config.max_ticks {
            if let Some(packet) = self.tick()?.into_iter().find(|p| p.dest == dest) {
                return Ok(packet);
            }
        }
        Err(NetworkError::Stalled { ticks: self.config.max_ticks })
    }

    /// Run with a NAT monitor on `config.nat_address`.
    ///
    /// The monitor keeps the most recent packet sent to its address. Each
    /// time the network goes idle it resends that packet to node 0. Returns
    /// the first `y` the monitor sends to node 0 twice in a row.
    pub fn run_with_nat(&mut self) -> Result<i64, NetworkError> {
        let nat = self.config.nat_address;
        let start = self.ticks;
        let mut stored: Option<Packet> = None;
        let mut last_y: Option<i64> = None;
        while self.ticks - start < self.config.max_ticks {
            for packet in self.tick()? {
                if packet.dest == nat {
                    stored = Some(packet);
                } else {
                    debug!("dropping packet to unknown address {}", packet.dest);
                }
            }
            if !self.is_idle() {
                continue;
            }
            let packet = stored.ok_or(NetworkError::Deadlocked)?;
            if last_y == Some(packet.y) {
                return Ok(packet.y);
            }
            debug!("network idle, NAT resends {packet:?}");
            last_y = Some(packet.y);
            self.deliver(Packet { dest: 0, ..packet });
            self.quiet = 0;
        }
        Err(NetworkError::Stalled { ticks: self.config.max_ticks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Boots, then sends `(255, addr, addr * 10)` and idles forever.
    const REPORTER: &str = "3,100,104,255,4,100,1002,100,10,101,4,101,3,102,1105,1,12,99";

    /// Boots, then forwards every received `(x, y)` to 255 as `(x, y + addr)`.
    const FORWARDER: &str = "3,100,3,101,1008,101,-1,103,1005,103,2,3,102,1,102,100,102,\
        104,255,4,101,4,102,1105,1,2,99";

    fn config(size: usize) -> NetworkConfig {
        NetworkConfig {
            size,
            max_ticks: 1000,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_first_external_packet() {
        let program: Program = REPORTER.parse().unwrap();
        let mut network = Network::new(&program, config(3));
        let packet = network.run_until_packet_to(255).unwrap();
        assert_eq!(packet, Packet { dest: 255, x: 0, y: 0 });
        assert_eq!(network.ticks(), 3);
    }

    #[test]
    fn test_every_node_reports() {
        let program: Program = REPORTER.parse().unwrap();
        let mut network = Network::new(&program, config(4));
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.extend(network.tick().unwrap());
        }
        seen.sort_by_key(|p| p.x);
        let expected: Vec<Packet> = (0..4)
            .map(|a| Packet { dest: 255, x: a, y: a * 10 })
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_injected_packet_is_forwarded() {
        let program: Program = FORWARDER.parse().unwrap();
        let mut network = Network::new(&program, config(3));
        assert_eq!(network.deliver(Packet { dest: 2, x: 7, y: 5 }), None);
        let packet = network.run_until_packet_to(255).unwrap();
        assert_eq!(packet, Packet { dest: 255, x: 7, y: 7 });
    }

    #[test]
    fn test_deliver_outside_network_is_returned() {
        let program: Program = FORWARDER.parse().unwrap();
        let mut network = Network::new(&program, config(2));
        let packet = Packet { dest: 9, x: 1, y: 2 };
        assert_eq!(network.deliver(packet), Some(packet));
        let packet = Packet { dest: -4, x: 1, y: 2 };
        assert_eq!(network.deliver(packet), Some(packet));
    }

    #[test]
    fn test_nat_detects_repeated_y() {
        let program: Program = FORWARDER.parse().unwrap();
        let mut network = Network::new(&program, config(3));
        network.deliver(Packet { dest: 2, x: 7, y: 5 });
        assert_eq!(network.run_with_nat(), Ok(7));
        assert!(network.is_idle());
        assert!(network.node(0).is_some_and(|n| n.needs_input()));
    }

    #[test]
    fn test_nat_without_traffic_deadlocks() {
        let program: Program = FORWARDER.parse().unwrap();
        let mut network = Network::new(&program, config(2));
        assert_eq!(network.run_with_nat(), Err(NetworkError::Deadlocked));
    }

    #[test]
    fn test_node_fault_is_wrapped() {
        let program: Program = "3,0,42".parse().unwrap();
        let mut network = Network::new(&program, config(2));
        let err = network.tick().unwrap_err();
        assert!(matches!(err, NetworkError::Node { node: 0, source: Fault::Decode { ip: 2, .. } }));
    }

    #[test]
    fn test_stalls_without_matching_packet() {
        let program: Program = REPORTER.parse().unwrap();
        let mut network = Network::new(&program, config(2));
        assert_eq!(
            network.run_until_packet_to(17),
            Err(NetworkError::Stalled { ticks: 1000 })
        );
    }
}
