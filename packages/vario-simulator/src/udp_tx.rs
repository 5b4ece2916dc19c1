//! udp_tx.rs — UDP transmitter for hub messages
//!
//! One JSON `HubMessage` per datagram, unicast to the backend hub
//! (127.0.0.1:5556 by default). Send errors are logged and never stop the sim.

use std::net::UdpSocket;

use tracing::{debug, warn};
use vario_types::{HubMessage, PositionSample, SampleEnvelope};

pub struct UdpTransmitter {
    socket: UdpSocket,
    hub_addr: String,
    device_id: String,
    next_seq: u32,
}

impl UdpTransmitter {
    pub fn new(hub_addr: &str, device_id: &str) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            hub_addr: hub_addr.to_string(),
            device_id: device_id.to_string(),
            next_seq: 0,
        })
    }

    /// Wrap a fix in an envelope with the next sequence number and send it.
    pub fn send_sample(&mut self, sample: PositionSample) {
        let envelope = SampleEnvelope {
            device_id: self.device_id.clone(),
            seq_num: self.next_seq,
            sample,
        };
        self.next_seq = self.next_seq.wrapping_add(1);
        self.send(&HubMessage::Sample(envelope));
    }

    pub fn send_end_flight(&self) {
        self.send(&HubMessage::EndFlight { device_id: self.device_id.clone() });
    }

    fn send(&self, msg: &HubMessage) {
        let bytes = match serde_json::to_vec(msg) {
            Ok(b) => b,
            Err(e) => {
                warn!("UDP: serialize failed: {e}");
                return;
            }
        };

        match self.socket.send_to(&bytes, &self.hub_addr) {
            Ok(_) => debug!("UDP → {} {} bytes", self.hub_addr, bytes.len()),
            Err(e) => warn!("UDP: send to {} failed: {e}", self.hub_addr),
        }
    }

    pub fn sent(&self) -> u32 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn recv(sock: &UdpSocket) -> HubMessage {
        let mut buf = [0u8; 2048];
        let (n, _) = sock.recv_from(&mut buf).unwrap();
        serde_json::from_slice(&buf[..n]).unwrap()
    }

    #[test]
    fn sends_sequenced_samples_then_end_flight() {
        let hub = UdpSocket::bind("127.0.0.1:0").unwrap();
        hub.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let addr = hub.local_addr().unwrap().to_string();

        let mut tx = UdpTransmitter::new(&addr, "glider-7").unwrap();
        tx.send_sample(PositionSample::at(1_000).with_altitude(1500.0));
        tx.send_sample(PositionSample::at(2_000).with_altitude(1501.0));
        tx.send_end_flight();
        assert_eq!(tx.sent(), 2);

        for expected_seq in 0..2 {
            match recv(&hub) {
                HubMessage::Sample(env) => {
                    assert_eq!(env.device_id, "glider-7");
                    assert_eq!(env.seq_num, expected_seq);
                }
                other => panic!("expected sample, got {other:?}"),
            }
        }
        assert!(matches!(recv(&hub), HubMessage::EndFlight { device_id } if device_id == "glider-7"));
    }
}
