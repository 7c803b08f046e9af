//! End-to-end coverage of the producer dispatcher against a real directory,
//! driven entirely through the public `ProducerDispatcher` API over an
//! in-process Face pair.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use rust_udcn_common::name::{Name, NameComponent};
use rust_udcn_common::naming;
use rust_udcn_common::packet::Interest;
use rust_udcn_face::{in_process_pair, Face, FaceEvent};
use rust_udcn_producer::{ProducerDispatcher, ProducerOptions};

#[test]
fn dispatcher_answers_metadata_and_content_interests() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("dataset.bin")).unwrap();
    file.write_all(&vec![b'z'; 100]).unwrap();
    drop(file);

    let options = ProducerOptions::new(dir.path().to_path_buf()).normalized();
    let (transport_producer, transport_consumer) = in_process_pair(256);
    let face_producer = Arc::new(Face::new(transport_producer, 8000));
    let face_consumer = Face::new(transport_consumer, 8000);

    let dispatcher = ProducerDispatcher::new(Arc::clone(&face_producer), options.clone());

    let discovery = naming::rdr_discovery_name_file(&options.prefix, &Name::from_path("dataset.bin"));
    let interest = Interest::new(discovery, 2000).can_be_prefix(true).must_be_fresh(true);
    face_consumer.send_interest(&interest, [9; 8]).unwrap();

    let event = face_consumer
        .events()
        .recv_timeout(Duration::from_secs(2))
        .expect("metadata response arrives");
    let data = match event {
        FaceEvent::Data { data, .. } => data,
        other => panic!("unexpected event: {other:?}"),
    };
    let meta = rust_udcn_common::metadata::FileMetadata::decode(&data.content).unwrap();
    assert_eq!(meta.size, 100);

    let segment_name = meta.versioned_name.clone().push(NameComponent::Segment(0));
    let content_interest = Interest::new(segment_name, 2000);
    face_consumer.send_interest(&content_interest, [10; 8]).unwrap();

    let event = face_consumer
        .events()
        .recv_timeout(Duration::from_secs(2))
        .expect("content response arrives");
    match event {
        FaceEvent::Data { data, .. } => {
            assert_eq!(data.content.len(), 100);
            assert!(data.content.iter().all(|&b| b == b'z'));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(dispatcher.metrics().metadata_responses.value() >= 1);
    assert!(dispatcher.metrics().content_responses.value() >= 1);
}

#[test]
fn dispatcher_nacks_a_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let options = ProducerOptions::new(dir.path().to_path_buf()).normalized();
    let (transport_producer, transport_consumer) = in_process_pair(256);
    let face_producer = Arc::new(Face::new(transport_producer, 8000));
    let face_consumer = Face::new(transport_consumer, 8000);

    let dispatcher = ProducerDispatcher::new(Arc::clone(&face_producer), options.clone());

    let discovery = naming::rdr_discovery_name_file(&options.prefix, &Name::from_path("missing.bin"));
    let interest = Interest::new(discovery, 2000).can_be_prefix(true).must_be_fresh(true);
    face_consumer.send_interest(&interest, [11; 8]).unwrap();

    let event = face_consumer
        .events()
        .recv_timeout(Duration::from_secs(2))
        .expect("nack response arrives");
    match event {
        FaceEvent::Data { data, .. } => {
            assert_eq!(data.meta.content_type, rust_udcn_common::packet::ContentType::Nack);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(dispatcher.metrics().nacks_sent.value() >= 1);
}
