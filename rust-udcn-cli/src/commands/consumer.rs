//! `udcn consumer`: list or copy files served under a producer's prefix.
//!
//! The data-plane transport (a memif ring shared with the forwarder) is an
//! external collaborator this crate does not bind — see
//! `rust_udcn_face::transport`. This command goes as far as the control
//! plane (registering a face and a FIB entry over the real GraphQL client)
//! and then reports why it cannot proceed, rather than fabricate a
//! transport. `udcn demo` shows the rest of the stack working end to end
//! over `InProcessTransport`.

use std::path::PathBuf;

use clap::Args;
use log::{error, info};
use rust_udcn_face::{ControlClient, FaceOptions};
use rust_udcn_pipeline::ConsumerOptions;
use rust_udcn_common::name::Name;

#[derive(Args, Debug)]
pub struct ConsumerArgs {
    /// GraphQL control-plane endpoint.
    #[arg(long, default_value = "http://localhost:3030")]
    pub gqlserver: String,

    /// Face MTU in bytes, 64..=9000.
    #[arg(long, default_value_t = 9000)]
    pub mtu: usize,

    /// Interest lifetime in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub lifetime: u64,

    /// Congestion control variant.
    #[arg(long, value_enum, default_value_t = PipelineType::Fixed)]
    pub pipeline_type: PipelineType,

    /// Fixed window size, or AIMD initial slow-start threshold.
    #[arg(long, default_value_t = rust_udcn_pipeline::window::FixedWindow::DEFAULT_CWND)]
    pub pipeline_size: usize,

    /// Name prefix the producer advertises.
    #[arg(long, default_value = "/ndn/ft")]
    pub name_prefix: String,

    /// Number of concurrent consumer streams (reserved; this build serves
    /// one consumer id per invocation).
    #[arg(long, default_value_t = 1)]
    pub streams: u8,

    /// List metadata for the given paths instead of copying them.
    #[arg(long, conflicts_with = "copy")]
    pub list: Vec<String>,

    /// Copy the given remote paths into the current directory.
    #[arg(long, conflicts_with = "list")]
    pub copy: Vec<String>,

    /// List directories recursively.
    #[arg(long)]
    pub recursive: bool,

    /// Destination directory for `--copy` (default: current directory).
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum PipelineType {
    Fixed,
    Aimd,
}

pub fn run(args: ConsumerArgs) -> i32 {
    if !(64..=9000).contains(&args.mtu) {
        error!("--mtu must be within 64..=9000, got {}", args.mtu);
        return 2;
    }
    if args.list.is_empty() && args.copy.is_empty() {
        error!("one of --list or --copy is required");
        return 2;
    }
    let face_options = FaceOptions {
        gql_server: args.gqlserver.clone(),
        mtu: args.mtu,
        ..FaceOptions::default()
    };
    let consumer_options = ConsumerOptions {
        prefix: Name::from_path(&args.name_prefix),
        lifetime_ms: args.lifetime,
    };
    info!(
        "consumer configured: prefix={} pipeline={:?}({}) lifetime={}ms",
        consumer_options.prefix, args.pipeline_type, args.pipeline_size, consumer_options.lifetime_ms
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
