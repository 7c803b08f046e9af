//! `udcn demo`: wires a producer dispatcher and a consumer pipeline
//! together over `InProcessTransport` and copies one file through the full
//! stack, to prove the core end to end without an external forwarder.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use log::{error, info};
use rust_udcn_common::naming;
use rust_udcn_face::{in_process_pair, Face};
use rust_udcn_pipeline::{ConsumerFacade, ConsumerOptions, Pipeline};
use rust_udcn_producer::{ProducerDispatcher, ProducerOptions};

use crate::utils::{format_bytes, format_duration, Timer};

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Directory the in-process producer serves.
    pub root: PathBuf,

    /// File under `root` to fetch through the consumer façade.
    pub file: String,

    /// Fixed congestion window for the demo pipeline.
    #[arg(long, default_value_t = 256)]
    pub pipeline_size: usize,
}

pub fn run(args: DemoArgs) -> i32 {
    if !args.root.is_dir() {
        error!("--root {:?} is not a directory", args.root);
        return 2;
    }

    let timer = Timer::new("demo transfer");
    let options = ProducerOptions::new(args.root.clone()).normalized();

    let (producer_transport, consumer_transport) = in_process_pair(64);
    let producer_face = Arc::new(Face::new(producer_transport, 9000));
    let consumer_face = Arc::new(Face::new(consumer_transport, 9000));

    let dispatcher = ProducerDispatcher::new(Arc::clone(&producer_face), options.clone());
    let pipeline = Arc::new(Pipeline::new_fixed(Arc::clone(&consumer_face), args.pipeline_size));
    let facade = ConsumerFacade::new(
        Arc::clone(&pipeline),
        ConsumerOptions {
            prefix: options.prefix.clone(),
            lifetime_ms: 2000,
        },
    );

    info!("fetching metadata for {}", args.file);
    let handle = match facade.open(&args.file) {
        Ok(handle) => handle,
        Err(e) => {
            error!("open({:?}) failed: {e}", args.file);
            dispatcher.close();
            return 2;
        }
    };
    let size = handle.metadata.size;
    info!("{} is {} ({} bytes)", args.file, format_bytes(size as usize), size);

    let content = match facade.read(&handle, 0, size) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("read({:?}) failed: {e}", args.file);
            facade.close(handle);
            dispatcher.close();
            return 2;
        }
    };
    facade.close(handle);

    let elapsed = timer.elapsed();
    println!(
        "fetched {} in {} ({})",
        format_bytes(content.len()),
        format_duration(elapsed),
        naming::rdr_discovery_name_file(&options.prefix, &rust_udcn_common::name::Name::from_path(&args.file))
    );

    dispatcher.close();
    0
}
