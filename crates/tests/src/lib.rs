//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载到监听器构造的全链路
//! - 帧队列语义 (FIFO / latest / 超时 / 名称唯一)
//! - 缩放与点云组织的不变量
//! - 保存 -> 回放的端到端流程 (无需硬件)

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{FrameId, SensorConfig, SourceConfig};

    const SETUP: &str = r#"
        version = "V1"

        [[listeners]]
        name = "front"
        resize_factor = 0.5
        sensor = { type = "cepton", mode = 2, framerate = 10 }
        source = { type = "saved", data_dir = "/data/front", frame_ids = ["ptclGrid", "imgGray"], repeat = true }

        [[listeners]]
        sensor = { type = "realsense", width = 640, height = 480, framerate = 30 }
        source = { type = "buffer", buffer_dir = "/tmp/rs" }
    "#;

    #[test]
    fn test_toml_and_json_agree() {
        let setup = ConfigLoader::load_from_str(SETUP, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&setup).unwrap();
        let reparsed = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        assert_eq!(reparsed.listeners.len(), 2);
        assert_eq!(reparsed.listeners[1].effective_name(), "RealSense");
        assert_eq!(reparsed.listeners[0].resize_factor, 0.5);
        assert_eq!(
            reparsed.listeners[0].sensor,
            SensorConfig::Cepton {
                mode: 2,
                framerate: 10,
                apply_processing: true
            }
        );
        match &reparsed.listeners[0].source {
            SourceConfig::Saved {
                frame_ids, repeat, ..
            } => {
                assert_eq!(frame_ids, &[FrameId::PointCloudGrid, FrameId::GrayscaleImage]);
                assert!(*repeat);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }
}

#[cfg(test)]
mod queue_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use contracts::ListenerError;
    use listener::mock::{gray_frame, ManualDevice, MockSensor, ScriptedSource};
    use listener::{NameRegistry, SensorListener};

    fn timestamps_of(listener: &SensorListener, n: usize) -> Vec<i64> {
        (0..n)
            .map(|_| listener.get_next_frame().unwrap().timestamp())
            .collect()
    }

    #[test]
    fn test_next_frame_times_out_on_idle_queue() {
        let registry = NameRegistry::new();
        let listener = SensorListener::builder(&registry, Arc::new(MockSensor::new(10)))
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();

        let started = Instant::now();
        let err = listener.get_next_frame().unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, ListenerError::QueueTimeout { waited_ms: 50, .. }));
        assert!(err.is_recoverable());
        assert!(elapsed >= Duration::from_millis(50), "returned after {elapsed:?}");
        assert!(elapsed < Duration::from_millis(100), "returned after {elapsed:?}");
    }

    #[test]
    fn test_duplicate_name_until_first_dropped() {
        let registry = NameRegistry::new();
        let build = || {
            SensorListener::builder(&registry, Arc::new(MockSensor::new(10)))
                .name("front")
                .build()
        };

        let first = build().unwrap();
        assert!(matches!(
            build(),
            Err(ListenerError::DuplicateName { ref name }) if name == "front"
        ));
        drop(first);
        let third = build().unwrap();
        assert_eq!(third.name(), "front");
    }

    #[test]
    fn test_poll_listener_delivers_in_production_order() {
        let registry = NameRegistry::new();
        let script = (1..=5).map(|ts| gray_frame(ts, ts as u8).unwrap()).collect();
        let mut listener = SensorListener::builder(&registry, Arc::new(MockSensor::new(500)))
            .timeout(Duration::from_secs(2))
            .poll(Box::new(ScriptedSource::new(script)))
            .build()
            .unwrap();

        listener.start_stream().unwrap();
        assert_eq!(timestamps_of(&listener, 5), vec![1, 2, 3, 4, 5]);
        listener.stop_stream().unwrap();
    }

    #[test]
    fn test_latest_frame_discards_backlog() {
        let registry = NameRegistry::new();
        let device = ManualDevice::new();
        let mut listener = SensorListener::builder(&registry, Arc::new(MockSensor::new(10)))
            .timeout(Duration::from_millis(50))
            .callback(Box::new(device.clone()))
            .build()
            .unwrap();

        listener.start_stream().unwrap();
        for ts in [10, 20, 30, 40] {
            assert!(device.deliver(gray_frame(ts, 0).unwrap()));
        }
        assert_eq!(listener.get_latest_frame().unwrap().timestamp(), 40);
        assert!(listener.get_latest_frame().is_err());

        let snapshot = listener.metrics_snapshot();
        assert_eq!(snapshot.frames_enqueued, 4);
        assert_eq!(snapshot.frames_consumed, 1);
        assert_eq!(snapshot.frames_dropped, 3);
        assert_eq!(snapshot.timeouts, 1);
        listener.stop_stream().unwrap();
    }

    #[test]
    fn test_consumers_on_other_threads_share_queue() {
        let registry = NameRegistry::new();
        let script = (1..=20).map(|ts| gray_frame(ts, 0).unwrap()).collect();
        let mut listener = SensorListener::builder(&registry, Arc::new(MockSensor::new(1000)))
            .timeout(Duration::from_millis(500))
            .poll(Box::new(ScriptedSource::new(script)))
            .build()
            .unwrap();
        listener.start_stream().unwrap();

        let listener = &listener;
        let mut seen: Vec<i64> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(move || {
                        let mut got = Vec::new();
                        while let Ok(frame) = listener.get_next_frame() {
                            got.push(frame.timestamp());
                        }
                        got
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        seen.sort_unstable();
        assert_eq!(seen, (1..=20).collect::<Vec<_>>());
    }
}

#[cfg(test)]
mod resize_tests {
    use contracts::FrameId;
    use frames::{CompositeFrame, DataFrame, FrameContext, Tensor, TypedFrame};

    fn composite() -> CompositeFrame {
        let grid = Tensor::from_vec(
            2,
            3,
            3,
            (0..18).map(|v| if v % 5 == 0 { 0.0 } else { v as f32 }).collect(),
        )
        .unwrap();
        let gray = Tensor::from_vec(2, 3, 1, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let rgb = gray.broadcast_channels(3).unwrap();
        CompositeFrame::new(1, true)
            .with_frame(DataFrame::point_grid(TypedFrame::new(grid, FrameContext::default())).unwrap())
            .unwrap()
            .with_frame(DataFrame::grayscale(TypedFrame::new(gray, FrameContext::default())).unwrap())
            .unwrap()
            .with_frame(DataFrame::rgb(TypedFrame::new(rgb, FrameContext::default())).unwrap())
            .unwrap()
    }

    #[test]
    fn test_unit_factor_changes_nothing() {
        let original = composite();
        let mut resized = original.clone();
        resized.resize_all(1.0).unwrap();
        assert_eq!(
            resized.point_grid().unwrap().tensor(),
            original.point_grid().unwrap().tensor()
        );
        assert_eq!(resized.rgb().unwrap().tensor(), original.rgb().unwrap().tensor());
    }

    #[test]
    fn test_upscale_then_downscale_restores_frames() {
        let original = composite();
        let mut frame = original.clone();
        frame.resize_all(2.0).unwrap();
        assert_eq!(frame.point_grid().unwrap().dims(), (4, 6, 3));
        assert_eq!(frame.grayscale().unwrap().dims(), (4, 6, 1));
        // nearest neighbour never invents values
        assert_eq!(frame.grayscale().unwrap().element(3, 5, 0), Some(6));

        frame.resize_all(0.5).unwrap();
        assert_eq!(
            frame.point_grid().unwrap().tensor(),
            original.point_grid().unwrap().tensor()
        );
        assert_eq!(
            frame.grayscale().unwrap().tensor(),
            original.grayscale().unwrap().tensor()
        );
    }

    #[test]
    fn test_mask_marks_nonzero_grid_pixels_at_capture_resolution() {
        let mut frame = composite();
        let expected: Vec<bool> = frame
            .point_grid()
            .unwrap()
            .tensor()
            .as_slice()
            .chunks_exact(3)
            .map(|p| p.iter().any(|v| *v != 0.0))
            .collect();
        assert_eq!(frame.mask().unwrap().tensor().as_slice(), expected.as_slice());

        frame.resize_all(2.0).unwrap();
        assert!(frame.has(FrameId::PointCloudMask));
        assert_eq!(frame.mask().unwrap().dims(), (2, 3, 1));
    }
}

#[cfg(test)]
mod organizer_tests {
    use frames::organizer::organize;
    use nalgebra::{Matrix3, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn intrinsic() -> Matrix3<f32> {
        Matrix3::new(100.0, 0.0, 50.0, 0.0, 100.0, 50.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn test_clustered_and_isolated_points_keep_their_depth() {
        let points = [
            Vector3::new(0.0, 0.0, 10.0),
            Vector3::new(0.01, 0.01, 10.0),
            Vector3::new(0.05, 0.05, 1.0),
        ];
        let grid = organize(&points, &intrinsic(), 3);
        assert_eq!(grid.dims(), (100, 100, 3));
        assert_eq!(grid.get(50, 50, 2), Some(10.0));
        assert_eq!(grid.get(55, 55, 2), Some(1.0));

        // filtering only fills the 3x3 neighbourhoods of the two occupied pixels
        for row in 0..100usize {
            for col in 0..100usize {
                let near = |r: usize, c: usize| row.abs_diff(r) <= 1 && col.abs_diff(c) <= 1;
                let z = grid.get(row, col, 2).unwrap();
                if near(50, 50) {
                    assert_eq!(z, 10.0, "pixel ({row}, {col})");
                } else if near(55, 55) {
                    assert_eq!(z, 1.0, "pixel ({row}, {col})");
                } else {
                    assert_eq!(z, 0.0, "pixel ({row}, {col})");
                }
            }
        }
    }

    #[test]
    fn test_repeated_runs_are_bit_identical() {
        let mut rng = StdRng::seed_from_u64(42);
        let points: Vec<Vector3<f32>> = (0..5000)
            .map(|_| {
                Vector3::new(
                    rng.random_range(-2.0..2.0),
                    rng.random_range(-2.0..2.0),
                    rng.random_range(0.5..20.0),
                )
            })
            .collect();

        for filter in [0, 3, 5] {
            let first = organize(&points, &intrinsic(), filter);
            for _ in 0..3 {
                let again = organize(&points, &intrinsic(), filter);
                let same = first
                    .as_slice()
                    .iter()
                    .zip(again.as_slice())
                    .all(|(a, b)| a.to_bits() == b.to_bits());
                assert!(same, "filter {filter} produced differing grids");
            }
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader, OverwritePolicy};
    use contracts::{CamParameters, FrameId};
    use frames::codec::ply;
    use frames::{PointCloud, PointSink};
    use listener::NameRegistry;
    use nalgebra::Vector3;

    fn write_scans(dir: &Path, depths: &[f32]) {
        let grid_dir = dir.join(FrameId::PointCloudGrid.as_str());
        std::fs::create_dir_all(&grid_dir).unwrap();
        for (n, depth) in depths.iter().enumerate() {
            let points = [Vector3::new(0.0, 0.0, *depth)];
            ply::write_points(&grid_dir.join(format!("ptclGrid{}.ply", n + 1)), &points).unwrap();
        }
    }

    /// Saved LiDAR scans -> organized grids -> listener queue
    #[test]
    fn test_saved_scans_replay_through_configured_listener() {
        let data = tempfile::tempdir().unwrap();
        write_scans(data.path(), &[5.0, 6.0, 7.0]);

        let toml = format!(
            r#"
            [[listeners]]
            name = "lidar"
            timeout_ms = 2000
            sensor = {{ type = "cepton", mode = 1, framerate = 100 }}
            source = {{ type = "saved", data_dir = "{}", frame_ids = ["ptclGrid"] }}
            "#,
            data.path().display()
        );
        let setup = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let registry = NameRegistry::new();
        let mut listeners = sensors::build_all(&registry, &setup).unwrap();
        let listener = &mut listeners[0];

        assert!(listener.capabilities().has_own_thread);
        assert_eq!(listener.cam_params().unwrap().cx(), 58.0);

        listener.start_stream().unwrap();
        let depths: Vec<f32> = (0..3)
            .map(|_| {
                let frame = listener.get_next_frame().unwrap();
                let grid = frame.point_grid().unwrap();
                assert_eq!(grid.dims(), (78, 116, 3));
                grid.element(39, 58, 2).unwrap()
            })
            .collect();
        assert_eq!(depths, vec![5.0, 6.0, 7.0]);

        // source exhausted: the stream ends by itself and further reads time out
        listener.set_timeout(Duration::from_millis(100));
        assert!(listener.get_next_frame().unwrap_err().is_recoverable());
        listener.stop_stream().unwrap();
    }

    /// Synthetic device -> dump_stream -> saved replay of the dump
    #[test]
    fn test_dumped_stream_replays_identically() {
        let work = tempfile::tempdir().unwrap();
        let dump_dir = work.path().join("dump");

        let synthetic = r#"
            [[listeners]]
            name = "syn"
            timeout_ms = 2000
            sensor = { type = "generic", kind = "dummy", framerate = 50 }
            source = { type = "synthetic", rows = 6, cols = 8 }
        "#;
        let setup = ConfigLoader::load_from_str(synthetic, ConfigFormat::Toml).unwrap();
        let registry = NameRegistry::new();
        let mut producer = sensors::build_listener(&registry, &setup.listeners[0]).unwrap();
        assert_eq!(producer.dump_stream(&dump_dir, Some(3)).unwrap(), 3);
        assert!(!producer.is_streaming());

        let replay = format!(
            r#"
            [[listeners]]
            name = "replay"
            timeout_ms = 2000
            sensor = {{ type = "generic", kind = "dummy", framerate = 100 }}
            source = {{ type = "saved", data_dir = "{}", frame_ids = ["ptclGrid", "imgGray", "imgRGB"] }}
            "#,
            dump_dir.display()
        );
        let setup = ConfigLoader::load_from_str(&replay, ConfigFormat::Toml).unwrap();
        let mut consumer = sensors::build_listener(&registry, &setup.listeners[0]).unwrap();
        consumer.start_stream().unwrap();
        for _ in 0..3 {
            let frame = consumer.get_next_frame().unwrap();
            assert_eq!(frame.point_grid().unwrap().dims(), (6, 8, 3));
            assert_eq!(frame.grayscale().unwrap().dims(), (6, 8, 1));
            assert_eq!(frame.rgb().unwrap().dims(), (6, 8, 3));
            assert!(frame.timestamp() > 0);

            let mut cloud = PointCloud::new();
            frame.to_point_cloud(&mut cloud).unwrap();
            let valid = frame
                .mask()
                .unwrap()
                .tensor()
                .as_slice()
                .iter()
                .filter(|v| **v)
                .count();
            assert_eq!(cloud.len(), valid);
            cloud.clear();
            assert!(cloud.is_empty());
        }
        consumer.stop_stream().unwrap();
    }

    /// Parameters saved by one listener are picked up by the next one built on the same dir
    #[test]
    fn test_calibration_persists_across_listeners() {
        let params_dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
            [[listeners]]
            name = "front"
            identity_name = "lidar"
            param_dir = "{}"
            sensor = {{ type = "generic", kind = "boson", framerate = 9 }}
            source = {{ type = "synthetic", rows = 4, cols = 4 }}
            "#,
            params_dir.path().display()
        );
        let setup = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let registry = NameRegistry::new();

        {
            let first = sensors::build_listener(&registry, &setup.listeners[0]).unwrap();
            first
                .set_cam_params(&CamParameters::pinhole(320.0, 321.0, 160.0, 120.0))
                .unwrap();
            assert!(first
                .save_parameters(params_dir.path(), OverwritePolicy::Overwrite)
                .unwrap());
            assert!(first
                .save_extrinsic(params_dir.path(), OverwritePolicy::Overwrite)
                .unwrap());
            assert!(!first
                .save_parameters(params_dir.path(), OverwritePolicy::KeepExisting)
                .unwrap());
        }

        let second = sensors::build_listener(&registry, &setup.listeners[0]).unwrap();
        let params = second.cam_params().unwrap();
        assert_eq!(params.fx(), 320.0);
        assert_eq!(params.fy(), 321.0);
        assert_eq!(params.cy(), 120.0);
        assert_eq!(second.identity_name(), Some("lidar"));
    }
}
