//! The two-channel TCP link back to the simulator.
//!
//! The simulator listens on two ports and passes them to this process on the
//! command line.  [`connect`] opens both:
//!
//! - the **main** channel carries requests from the simulator and exactly one
//!   response per request;
//! - the **irq** channel carries unsolicited IRQ notifications from this
//!   process, independent of any pending request.
//!
//! Framing is the fixed 20-byte packet and nothing else — no length prefix,
//! no reassembly.  A stream that delivers fewer than [`PACKET_SIZE`] bytes
//! before closing is a fatal protocol error ([`LinkError::InvalidFormat`]),
//! never something to retry.  There is no reconnect logic: both connections
//! live for the lifetime of the process.

use std::net::SocketAddr;

use buslink_core::protocol::packet::{Packet, PACKET_SIZE};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Errors on the simulator link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Socket creation or connect failed; any socket already opened was
    /// closed before this was returned.
    #[error("connection refused by {addr}: {source}")]
    ConnectionRefused {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The underlying receive or send call itself failed.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream delivered a number of bytes other than exactly one packet.
    /// Fatal: the serving loop exits and the process tears down.
    #[error("short or garbled packet on the wire (expected exactly {PACKET_SIZE} bytes)")]
    InvalidFormat,
}

/// Request/response channel.  Owned by the serving loop.
#[derive(Debug)]
pub struct MainChannel {
    stream: TcpStream,
}

/// Unsolicited notification channel.  Owned by the irq pump task.
#[derive(Debug)]
pub struct IrqChannel {
    stream: TcpStream,
}

/// Opens both TCP connections to the simulator.
///
/// On failure of the second connect the already-open main socket is closed
/// (dropped) before the error is returned, so no half-connected state leaks.
pub async fn connect(
    address: std::net::IpAddr,
    main_port: u16,
    irq_port: u16,
) -> Result<(MainChannel, IrqChannel), LinkError> {
    let main_addr = SocketAddr::new(address, main_port);
    let main = TcpStream::connect(main_addr)
        .await
        .map_err(|source| LinkError::ConnectionRefused {
            addr: main_addr,
            source,
        })?;

    let irq_addr = SocketAddr::new(address, irq_port);
    let irq = match TcpStream::connect(irq_addr).await {
        Ok(stream) => stream,
        Err(source) => {
            // `main` drops (closes) here.
            return Err(LinkError::ConnectionRefused {
                addr: irq_addr,
                source,
            });
        }
    };

    info!("connected to simulator at {main_addr} (main) and {irq_addr} (irq)");
    Ok((MainChannel { stream: main }, IrqChannel { stream: irq }))
}

/// Maps an exact-size read/write result to the link error taxonomy:
/// an EOF inside (or at the start of) a packet is a format violation, any
/// other failure is plain I/O.
fn map_io(e: std::io::Error) -> LinkError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof || e.kind() == std::io::ErrorKind::WriteZero {
        LinkError::InvalidFormat
    } else {
        LinkError::Io(e)
    }
}

impl MainChannel {
    /// Receives exactly one request packet (blocking receive, awaited).
    pub async fn wait_request(&mut self) -> Result<Packet, LinkError> {
        let mut buf = [0u8; PACKET_SIZE];
        self.stream.read_exact(&mut buf).await.map_err(map_io)?;
        let packet = Packet::from_bytes(&buf);
        debug!(?packet, "request received");
        Ok(packet)
    }

    /// Sends exactly one response packet.
    pub async fn send_response(&mut self, res: &Packet) -> Result<(), LinkError> {
        self.stream
            .write_all(&res.to_bytes())
            .await
            .map_err(map_io)?;
        debug!(?res, "response sent");
        Ok(())
    }

    /// Closes the main channel.  Dropping the channel closes it too; this is
    /// the explicit form for ordered teardown.
    pub async fn disconnect(mut self) -> Result<(), LinkError> {
        self.stream.shutdown().await.map_err(LinkError::Io)
    }
}

impl IrqChannel {
    /// Sends a single IRQ-typed packet.  addr/value carry no meaning.
    pub async fn notify(&mut self) -> Result<(), LinkError> {
        self.stream
            .write_all(&Packet::irq().to_bytes())
            .await
            .map_err(map_io)?;
        debug!("irq notified");
        Ok(())
    }

    /// Closes the irq channel.
    pub async fn disconnect(mut self) -> Result<(), LinkError> {
        self.stream.shutdown().await.map_err(LinkError::Io)
    }
}
