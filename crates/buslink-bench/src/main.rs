//! Instrumentation bench entry point.
//!
//! Wires together the configuration, the instrument bank, the two-channel
//! link to the simulator, the irq pump, and the observation loop, then runs
//! the serving loop until DISCONNECT or a fatal link error.
//!
//! ```text
//! main()
//!  └─ load_config()                 -- buslink.toml, defaults if absent
//!  └─ InstrumentBank               -- keypad + dcmotor + uart
//!  └─ link::connect()              -- main + irq TCP channels
//!  └─ spawn_irq_pump()             -- drains raised IRQs to the irq socket
//!  └─ observation loop             -- periodic render pass under the lock
//!  └─ InstrumentServer::serve()    -- request/response until DISCONNECT
//! ```
//!
//! The bench is the connecting side: the simulator listens on both ports and
//! the bench dials in.  `<address>` is the simulator's IP.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use buslink_core::bank::InstrumentBank;
use buslink_bench::config::{self, AppConfig};
use buslink_bench::instruments::dcmotor::DcMotorInstrument;
use buslink_bench::instruments::keypad::KeypadInstrument;
use buslink_bench::instruments::motor::MotorParams;
use buslink_bench::instruments::uart::UartInstrument;
use buslink_bench::link;
use buslink_bench::server::{irq_notifier, spawn_irq_pump, InstrumentServer, SharedBank};

/// Interval of the observation (render) pass.
const RENDER_INTERVAL: Duration = Duration::from_millis(50);

struct Args {
    main_port: u16,
    irq_port: u16,
    address: IpAddr,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [main_port, irq_port, address] = args.as_slice() else {
        eprintln!("usage: buslink-bench <main_port> <irq_port> <address>");
        std::process::exit(2);
    };

    Ok(Args {
        main_port: main_port
            .parse()
            .with_context(|| format!("invalid main port {main_port:?}"))?,
        irq_port: irq_port
            .parse()
            .with_context(|| format!("invalid irq port {irq_port:?}"))?,
        address: address
            .parse()
            .with_context(|| format!("invalid address {address:?}"))?,
    })
}

fn build_bank(cfg: &AppConfig) -> (SharedBank, tokio::sync::mpsc::UnboundedReceiver<()>) {
    let (notifier, raised) = irq_notifier();

    let mut bank = InstrumentBank::new();
    // The notifier must be in place before instruments register, so every
    // device's IRQ callback is wired at add time.
    bank.set_irq_notifier(notifier);
    bank.add_instrument(Box::new(KeypadInstrument::new()));
    bank.add_instrument(Box::new(DcMotorInstrument::new(MotorParams {
        dt: cfg.motor.dt,
        ..MotorParams::default()
    })));
    bank.add_instrument(Box::new(UartInstrument::with_tick_budget(
        cfg.bus.tick_budget,
    )));

    (Arc::new(Mutex::new(bank)), raised)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;

    let cfg = config::load_config(Path::new(config::CONFIG_FILE))
        .context("failed to load configuration")?;

    // RUST_LOG takes precedence over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.bench.log_level.clone())),
        )
        .init();

    info!(
        address = %args.address,
        main_port = args.main_port,
        irq_port = args.irq_port,
        "instrumentation bench starting"
    );

    let (bank, raised) = build_bank(&cfg);

    let (main, irq) = link::connect(args.address, args.main_port, args.irq_port)
        .await
        .context("failed to connect to the simulator")?;
    info!("both channels connected");

    let pump = spawn_irq_pump(irq, raised);

    // Observation loop: takes the bank lock once per pass, so it interleaves
    // with request dispatch but never observes a half-applied write.
    let render_bank = Arc::clone(&bank);
    let render = tokio::spawn(async move {
        let mut interval = tokio::time::interval(RENDER_INTERVAL);
        loop {
            interval.tick().await;
            render_bank.lock().await.render();
        }
    });

    let server = InstrumentServer::new(bank, main);
    let served = tokio::select! {
        result = server.serve() => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            None
        }
    };

    render.abort();
    pump.abort();

    if let Some(result) = served {
        result.context("serving loop failed")?;
        info!("simulator disconnected");
    }
    info!("instrumentation bench stopped");
    Ok(())
}
