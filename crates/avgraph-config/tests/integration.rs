//! Integration tests for avgraph-config.
//!
//! These tests go from TOML files on disk to stages moving buffers.

use std::sync::{Arc, mpsc};

use avgraph_config::{ConfigError, FormatConfig, StageConfig, VideoFormat};
use avgraph_core::{GraphState, OutputEvent, StageEvent, formats};
use avgraph_engine::PixelFormat;
use avgraph_engine::routing::RoutingEngine;
use avgraph_media::BufferAllocator;
use tempfile::TempDir;

fn split_config() -> StageConfig {
    let mut config = StageConfig::new("[cam]split[left][right]").with_option("threads", "2");
    config.add_input(
        "cam",
        Some(FormatConfig::Video(
            VideoFormat::new("nv12", 64, 48).with_frame_rate("25"),
        )),
    );
    config.add_output("left");
    config.add_output("right");
    config
}

/// A config saved into a missing directory loads back unchanged.
#[test]
fn save_creates_directories_and_loads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stages").join("split.toml");

    let config = split_config();
    config.save(&path).unwrap();
    assert!(path.exists());

    let loaded = StageConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

/// A loaded config builds a stage that feeds both outputs.
#[test]
fn loaded_config_moves_buffers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("split.toml");
    split_config().save(&path).unwrap();

    let mut built = StageConfig::load(&path)
        .unwrap()
        .build(Arc::new(RoutingEngine::new()))
        .unwrap();
    assert_eq!(built.stage.graph_state(), GraphState::Configured);
    assert!(built.stage.take_events().contains(&StageEvent::SyncAcquired));

    let alloc = BufferAllocator::new();
    built.stage.set_allocator(alloc.clone());
    let mut receivers = Vec::new();
    for id in built.outputs.values() {
        let (tx, rx) = mpsc::channel();
        built.stage.attach_output(*id, Box::new(tx)).unwrap();
        receivers.push(rx);
    }

    let planes = formats::pixel_planes(PixelFormat::Nv12).unwrap();
    for i in 0..3u64 {
        let mut buffer = alloc.picture(64, 48, &planes).build();
        buffer.attrs.pts_prog = Some(i * 1_080_000);
        built.stage.push_input(built.inputs["cam"], buffer).unwrap();
    }

    for rx in receivers {
        let delivered = rx
            .try_iter()
            .filter(|e| matches!(e, OutputEvent::Buffer(_)))
            .count();
        assert_eq!(delivered, 3);
    }
}

/// Missing files report their path.
#[test]
fn missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = StageConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

/// Broken TOML is a parse error, not a panic.
#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "description = [unterminated").unwrap();
    assert!(matches!(
        StageConfig::load(&path),
        Err(ConfigError::TomlParse(_))
    ));
}

/// An output the description never mentions leaves the graph absent and
/// says why through an event.
#[test]
fn stray_output_is_reported_as_an_event() {
    let mut config = split_config();
    config.add_output("extra");
    let mut built = config.build(Arc::new(RoutingEngine::new())).unwrap();
    assert_eq!(built.stage.graph_state(), GraphState::Absent);
    assert!(
        built
            .stage
            .take_events()
            .iter()
            .any(|e| matches!(e, StageEvent::GraphFailed { message, .. } if message.contains("extra")))
    );
}

/// Until every labelled output has a pad the graph simply waits.
#[test]
fn missing_output_pad_waits_quietly() {
    let mut config = split_config();
    config.outputs.pop();
    let mut built = config.build(Arc::new(RoutingEngine::new())).unwrap();
    assert_eq!(built.stage.graph_state(), GraphState::Absent);
    assert!(
        !built
            .stage
            .take_events()
            .iter()
            .any(|e| matches!(e, StageEvent::GraphFailed { .. }))
    );

    let id = built.stage.add_output_pad("right").unwrap();
    assert!(built.stage.pad_is_bound(id));
    assert_eq!(built.stage.graph_state(), GraphState::Configured);
}
