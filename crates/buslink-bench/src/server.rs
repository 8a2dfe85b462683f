//! The serving loop and the irq pump.
//!
//! One task runs the request/response cycle: wait for a packet, take the
//! bank lock, dispatch, release, respond.  The lock is never held across the
//! blocking receive, so an external observation loop (the render pass) can
//! interleave between requests — but no one ever observes a partially
//! applied multi-device write.
//!
//! Devices raise IRQs synchronously from inside the lock.  To keep the
//! notifier non-blocking, it only pushes a token onto an unbounded channel;
//! a dedicated pump task drains the channel and writes IRQ packets to the
//! irq socket.  There is no pipelining anywhere: at most one request is in
//! flight at a time.

use std::sync::Arc;

use buslink_core::bank::{Dispatch, InstrumentBank};
use buslink_core::peripheral::IrqNotifier;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::link::{IrqChannel, LinkError, MainChannel};

/// Shared, lock-guarded instrument bank.
pub type SharedBank = Arc<Mutex<InstrumentBank>>;

/// Creates the shared IRQ notifier and the receiving end the pump drains.
///
/// The notifier is cheap and non-blocking (an unbounded channel push), so
/// devices may invoke it from inside the bank lock.
pub fn irq_notifier() -> (IrqNotifier, mpsc::UnboundedReceiver<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let notifier: IrqNotifier = Arc::new(move || {
        // The pump having gone away only matters during teardown.
        let _ = tx.send(());
    });
    (notifier, rx)
}

/// Spawns the task that writes one IRQ packet per raised notification.
pub fn spawn_irq_pump(
    mut irq: IrqChannel,
    mut raised: mpsc::UnboundedReceiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while raised.recv().await.is_some() {
            if let Err(e) = irq.notify().await {
                error!("irq channel failed: {e}");
                break;
            }
        }
        info!("irq pump stopped");
    })
}

/// Owns the main channel and the serving loop.
pub struct InstrumentServer {
    bank: SharedBank,
    main: MainChannel,
}

impl InstrumentServer {
    pub fn new(bank: SharedBank, main: MainChannel) -> Self {
        Self { bank, main }
    }

    /// Runs the request/response cycle until DISCONNECT or a fatal link
    /// error.  Exactly one response is sent per request; DISCONNECT gets
    /// none.  The main channel is shut down on the way out.
    pub async fn serve(mut self) -> Result<(), LinkError> {
        let result = self.serve_inner().await;
        if let Err(e) = &result {
            warn!("serving loop terminating on link error: {e}");
        }
        // Best effort: a link that already failed may refuse the shutdown.
        if let Err(e) = self.main.disconnect().await {
            warn!("main channel shutdown failed: {e}");
        }
        result
    }

    async fn serve_inner(&mut self) -> Result<(), LinkError> {
        loop {
            let req = self.main.wait_request().await?;

            // One request = one critical section.  The lock is released
            // before the response hits the socket.
            let dispatch = {
                let mut bank = self.bank.lock().await;
                bank.handle_request(&req)
            };

            match dispatch {
                Dispatch::Respond(res) => self.main.send_response(&res).await?,
                Dispatch::Stop => {
                    info!("disconnect requested; serving loop stopping");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buslink_core::protocol::packet::{Packet, PacketType, PACKET_SIZE};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::instruments::keypad::{KeypadInstrument, KEYPAD_REG_KEYS};
    use crate::link;

    /// Spins up a bank with one keypad and a serving loop over real sockets.
    /// Returns the simulator-side streams and the server join handle.
    async fn harness() -> (TcpStream, TcpStream, JoinHandle<Result<(), LinkError>>) {
        let main_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let irq_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let main_port = main_listener.local_addr().unwrap().port();
        let irq_port = irq_listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move {
            let (m, _) = main_listener.accept().await.unwrap();
            let (i, _) = irq_listener.accept().await.unwrap();
            (m, i)
        });

        let (main, irq) = link::connect("127.0.0.1".parse().unwrap(), main_port, irq_port)
            .await
            .unwrap();
        let (sim_main, sim_irq) = accept.await.unwrap();

        let (notifier, raised) = irq_notifier();
        let mut bank = InstrumentBank::new();
        bank.set_irq_notifier(notifier);
        bank.add_instrument(Box::new(KeypadInstrument::new()));
        let bank = Arc::new(Mutex::new(bank));

        spawn_irq_pump(irq, raised);
        let server = InstrumentServer::new(bank, main);
        let handle = tokio::spawn(server.serve());

        (sim_main, sim_irq, handle)
    }

    async fn transact(sim: &mut TcpStream, req: Packet) -> Packet {
        sim.write_all(&req.to_bytes()).await.unwrap();
        let mut buf = [0u8; PACKET_SIZE];
        sim.read_exact(&mut buf).await.unwrap();
        Packet::from_bytes(&buf)
    }

    #[tokio::test]
    async fn test_exactly_one_response_per_request() {
        let (mut sim, _irq, handle) = harness().await;

        let res = transact(&mut sim, Packet::new(PacketType::Read32, KEYPAD_REG_KEYS, 0)).await;
        assert_eq!(res.packet_type, PacketType::Ok);
        assert_eq!(res.value, 0);

        // No extra bytes follow the response.
        let mut probe = [0u8; 1];
        let extra = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            sim.read_exact(&mut probe),
        )
        .await;
        assert!(extra.is_err());

        drop(sim);
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_disconnect_stops_the_loop_without_a_response() {
        let (mut sim, _irq, handle) = harness().await;

        sim.write_all(&Packet::new(PacketType::Disconnect, 0, 0).to_bytes())
            .await
            .unwrap();

        assert!(handle.await.unwrap().is_ok());

        // The server closed the stream without responding.
        let mut buf = [0u8; 1];
        let n = sim.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_short_packet_is_fatal_to_the_loop() {
        let (mut sim, _irq, handle) = harness().await;

        sim.write_all(&[0xAA; 7]).await.unwrap();
        drop(sim);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, LinkError::InvalidFormat), "{err}");
    }

    #[tokio::test]
    async fn test_raised_irq_reaches_the_irq_socket() {
        let (notifier, raised) = irq_notifier();

        let irq_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let irq_port = irq_listener.local_addr().unwrap().port();
        let main_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let main_port = main_listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move {
            let (m, _) = main_listener.accept().await.unwrap();
            let (i, _) = irq_listener.accept().await.unwrap();
            (m, i)
        });
        let (_main, irq) = link::connect("127.0.0.1".parse().unwrap(), main_port, irq_port)
            .await
            .unwrap();
        let (_sim_main, mut sim_irq) = accept.await.unwrap();

        spawn_irq_pump(irq, raised);
        notifier();
        notifier();

        let mut buf = [0u8; PACKET_SIZE];
        sim_irq.read_exact(&mut buf).await.unwrap();
        assert_eq!(Packet::from_bytes(&buf).packet_type, PacketType::Irq);
        sim_irq.read_exact(&mut buf).await.unwrap();
        assert_eq!(Packet::from_bytes(&buf).packet_type, PacketType::Irq);
    }
}
