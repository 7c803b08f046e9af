//! `udcn producer`: serve a directory tree's metadata and content segments
//! under an advertised name prefix.
//!
//! Like `consumer`, this command registers with the control plane over the
//! real GraphQL client and then reports that no memif transport binding is
//! available to actually open the face — see `commands::consumer` and
//! `udcn demo`.

use std::path::PathBuf;

use clap::Args;
use log::error;
use rust_udcn_face::{ControlClient, FaceOptions};
use rust_udcn_producer::ProducerOptions;
use rust_udcn_common::name::{Name, MAX_NDN_PACKET_SIZE};

#[derive(Args, Debug)]
pub struct ProducerArgs {
    /// Directory tree to serve.
    pub root: PathBuf,

    /// GraphQL control-plane endpoint.
    #[arg(long, default_value = "http://localhost:3030")]
    pub gqlserver: String,

    /// Face MTU in bytes, 64..=9000.
    #[arg(long, default_value_t = 9000)]
    pub mtu: usize,

    /// Name prefix to advertise.
    #[arg(long, default_value = "/ndn/ft")]
    pub name_prefix: String,

    /// Content segment size in bytes, <= 8800.
    #[arg(long, default_value_t = rust_udcn_producer::config::DEFAULT_SEGMENT_SIZE)]
    pub segment_size: u64,

    /// Worker thread-pool size.
    #[arg(long, default_value_t = rust_udcn_producer::config::DEFAULT_NTHREADS)]
    pub nthreads: u16,

    /// File-handle evictor sweep period, in seconds.
    #[arg(long, default_value_t = rust_udcn_producer::config::DEFAULT_GC_PERIOD.as_secs())]
    pub garbage_collector_timer: u64,

    /// Idle lifetime before a cached file handle is evicted, in seconds.
    #[arg(long, default_value_t = rust_udcn_producer::config::DEFAULT_GC_LIFETIME.as_secs())]
    pub garbage_collector_lifetime: u64,

    /// Serve Data unsigned (skip the SHA-256 digest signature).
    #[arg(long)]
    pub disable_signing: bool,
}

pub fn run(args: ProducerArgs) -> i32 {
    if !(64..=9000).contains(&args.mtu) {
        error!("--mtu must be within 64..=9000, got {}", args.mtu);
        return 2;
    }
    if args.segment_size == 0 || args.segment_size > MAX_NDN_PACKET_SIZE as u64 {
        error!("--segment-size must be within 1..={}, got {}", MAX_NDN_PACKET_SIZE, args.segment_size);
        return 2;
    }
    if !args.root.is_dir() {
        error!("--root {:?} is not a directory", args.root);
        return 2;
    }

    let face_options = FaceOptions {
        gql_server: args.gqlserver.clone(),
        mtu: args.mtu,
        ..FaceOptions::default()
    };
    let options = ProducerOptions {
        root_dir: args.root.clone(),
        prefix: Name::from_path(&args.name_prefix),
        segment_size: args.segment_size,
        nthreads: args.nthreads,
        gc_period: std::time::Duration::from_secs(args.garbage_collector_timer),
        gc_lifetime: std::time::Duration::from_secs(args.garbage_collector_lifetime),
        disable_signing: args.disable_signing,
    }
    .normalized();
    log::info!(
        "producer configured: root={:?} prefix={} segment_size={} nthreads={}",
        options.root_dir, options.prefix, options.segment_size, options.nthreads
    );

    let mut control = ControlClient::new(face_options.gql_server.clone());
    if let Err(e) = control.create_face(1, face_options.dataroom) {
        error!("failed to register face with forwarder: {e}");
        return 2;
    }
    if let Err(e) = control.insert_fib_entry(&args.name_prefix) {
        error!("failed to install FIB entry: {e}");
        let _ = control.delete_face();
        return 2;
    }

    error!(
        "face registered at socket {}, but this build has no memif transport binding to open it; \
         run `udcn demo` for a self-contained in-process round trip",
        control.socket_path()
    );
    let _ = control.delete_face();
    2
}
