//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置合约测试
//! - 模拟 e2e 测试（无需 CARLA）：完整的 SETUP -> LISTENING -> DRAINING -> DONE

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CaptureBlueprint, SensorKind};

    #[test]
    fn test_empty_config_matches_defaults() {
        let blueprint = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        let defaults = CaptureBlueprint::default();
        assert_eq!(blueprint.capture.frames, defaults.capture.frames);
        assert_eq!(blueprint.vehicle.blueprint, "vehicle.tesla.model3");
        assert_eq!(
            blueprint.lidar.blueprint,
            SensorKind::Lidar.default_blueprint()
        );
        assert_eq!(
            blueprint.camera.blueprint,
            SensorKind::Camera.default_blueprint()
        );
    }

    #[test]
    fn test_output_layout() {
        assert_eq!(SensorKind::Lidar.frame_file_name(42), "000042.bin");
        assert_eq!(SensorKind::Camera.frame_file_name(42), "000042.png");
        assert_eq!(SensorKind::Lidar.output_dir_name(), "velodyne");
        assert_eq!(SensorKind::Camera.output_dir_name(), "images");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use actor_factory::{ActorFactoryError, MockCarlaClient, MockConfig, SimCall};
    use capture::{CaptureConfig, CaptureController, CaptureError, CaptureOutcome};
    use contracts::{ActorId, CaptureBlueprint, SensorKind};
    use tempfile::tempdir;
    use tokio::sync::watch;

    const CAMERA_WIDTH: u32 = 16;
    const CAMERA_HEIGHT: u32 = 8;
    const LIDAR_POINTS: u32 = 64;

    fn capture_config(out: &Path, frames: u64) -> CaptureConfig {
        let mut blueprint = CaptureBlueprint::default();
        blueprint.capture.frames = frames;
        blueprint.capture.output_dir = Some(out.to_path_buf());
        blueprint.capture.poll_interval_ms = 5;
        blueprint.camera.image_size_x = CAMERA_WIDTH;
        blueprint.camera.image_size_y = CAMERA_HEIGHT;
        CaptureConfig::from_blueprint(blueprint)
            .unwrap()
            .with_narration(false)
    }

    fn mock_client(config: MockConfig) -> MockCarlaClient {
        MockCarlaClient::with_config(MockConfig {
            tick_interval: Some(Duration::from_millis(2)),
            lidar_points_per_frame: LIDAR_POINTS,
            ..config
        })
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn frame_stems(dir: &Path) -> Vec<u64> {
        files_in(dir)
            .iter()
            .map(|name| name.split('.').next().unwrap().parse().unwrap())
            .collect()
    }

    fn spawned(client: &MockCarlaClient, blueprint: &str) -> Option<ActorId> {
        client.calls().into_iter().find_map(|c| match c {
            SimCall::SpawnVehicle {
                actor_id,
                blueprint: b,
            }
            | SimCall::SpawnSensor {
                actor_id,
                blueprint: b,
                ..
            } if b == blueprint => Some(actor_id),
            _ => None,
        })
    }

    async fn wait_for_listen(client: &MockCarlaClient) {
        for _ in 0..500 {
            if client
                .calls()
                .iter()
                .filter(|c| matches!(c, SimCall::Listen(_)))
                .count()
                == 2
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("sensors never started listening");
    }

    /// 正常采集：帧数不超过预算，文件名落在 [baseline, baseline + budget)
    #[tokio::test]
    async fn test_e2e_budget_bounds_files() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig::default());
        let (_tx, rx) = watch::channel(false);

        let stats = CaptureController::new(client.clone(), capture_config(out.path(), 10))
            .run(rx)
            .await
            .unwrap();

        assert_eq!(stats.outcome, CaptureOutcome::Completed);
        let baseline = stats.baseline.unwrap();

        for kind in SensorKind::ALL {
            let dir = out.path().join(kind.output_dir_name());
            let names = files_in(&dir);
            assert!(names.len() <= 10, "{kind}: {} files", names.len());
            assert!(names
                .iter()
                .all(|n| n.len() == 10 && n.ends_with(kind.file_extension())));

            let stems = frame_stems(&dir);
            assert!(stems.iter().all(|&f| (baseline..baseline + 10).contains(&f)));
        }

        // 每个 actor 恰好销毁一次，车辆最后
        let vehicle = spawned(&client, "vehicle.tesla.model3").unwrap();
        let lidar = spawned(&client, "sensor.lidar.ray_cast").unwrap();
        let camera = spawned(&client, "sensor.camera.rgb").unwrap();
        for actor in [vehicle, lidar, camera] {
            assert_eq!(client.destroy_count(actor), 1);
        }
        let vehicle_destroy = client.position_of(&SimCall::Destroy(vehicle)).unwrap();
        assert!(client.position_of(&SimCall::Destroy(lidar)).unwrap() < vehicle_destroy);
        assert!(client.position_of(&SimCall::Destroy(camera)).unwrap() < vehicle_destroy);
        assert_eq!(client.alive_actor_count(), 0);
    }

    /// 写出的文件内容可解码：点云为 16 字节 stride，PNG 为 RGB
    #[tokio::test]
    async fn test_e2e_written_payloads_decode() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig::default());
        let (_tx, rx) = watch::channel(false);

        let stats = CaptureController::new(client, capture_config(out.path(), 5))
            .run(rx)
            .await
            .unwrap();
        assert!(stats.sensor(SensorKind::Camera).written > 0);
        assert!(stats.sensor(SensorKind::Lidar).written > 0);

        let velodyne = out.path().join("velodyne");
        for name in files_in(&velodyne) {
            let bytes = fs::read(velodyne.join(&name)).unwrap();
            assert_eq!(bytes.len(), LIDAR_POINTS as usize * 16);
        }

        let images = out.path().join("images");
        for name in files_in(&images) {
            let frame: u64 = name.trim_end_matches(".png").parse().unwrap();
            let img = image::open(images.join(&name)).unwrap().to_rgb8();
            assert_eq!(img.dimensions(), (CAMERA_WIDTH, CAMERA_HEIGHT));

            // mock 相机输出 BGRA = (x, y, frame, 255)
            let pixel = img.get_pixel(3, 5);
            assert_eq!(pixel.0, [(frame % 256) as u8, 5, 3]);
        }
    }

    /// 出生点被占用：致命错误，不创建传感器，目录为空
    #[tokio::test]
    async fn test_e2e_spawn_point_occupied() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig {
            spawn_point_occupied: true,
            ..Default::default()
        });
        let (_tx, rx) = watch::channel(false);

        let err = CaptureController::new(client.clone(), capture_config(out.path(), 10))
            .run(rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CaptureError::Simulator(ActorFactoryError::SpawnPointOccupied { .. })
        ));
        assert!(err.to_string().contains("spawn point occupied"));
        assert!(!client
            .calls()
            .iter()
            .any(|c| matches!(c, SimCall::SpawnSensor { .. } | SimCall::Destroy(_))));
        assert!(files_in(&out.path().join("velodyne")).is_empty());
        assert!(files_in(&out.path().join("images")).is_empty());
    }

    /// LISTENING 中途中断：两个传感器都先停止，然后才销毁车辆
    #[tokio::test]
    async fn test_e2e_interrupt_mid_capture() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig::default());
        let (tx, rx) = watch::channel(false);

        let controller = CaptureController::new(client.clone(), capture_config(out.path(), 100_000));
        let run = tokio::spawn(controller.run(rx));

        wait_for_listen(&client).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let stats = run.await.unwrap().unwrap();
        assert_eq!(stats.outcome, CaptureOutcome::Interrupted);

        let vehicle = spawned(&client, "vehicle.tesla.model3").unwrap();
        let lidar = spawned(&client, "sensor.lidar.ray_cast").unwrap();
        let camera = spawned(&client, "sensor.camera.rgb").unwrap();
        let vehicle_destroy = client.position_of(&SimCall::Destroy(vehicle)).unwrap();
        assert!(client.position_of(&SimCall::Stop(lidar)).unwrap() < vehicle_destroy);
        assert!(client.position_of(&SimCall::Stop(camera)).unwrap() < vehicle_destroy);
        assert!(
            client
                .position_of(&SimCall::SetAutopilot(vehicle, false))
                .unwrap()
                < vehicle_destroy
        );

        // 中断前写出的文件保持完整
        for name in files_in(&out.path().join("velodyne")) {
            let len = fs::metadata(out.path().join("velodyne").join(name))
                .unwrap()
                .len();
            assert_eq!(len, LIDAR_POINTS as u64 * 16);
        }
        assert_eq!(client.alive_actor_count(), 0);
    }

    /// 相机挂载失败：只销毁已创建的车辆与 LiDAR
    #[tokio::test]
    async fn test_e2e_partial_attach_failure() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig {
            fail_attach: vec!["sensor.camera.rgb".to_string()],
            ..Default::default()
        });
        let (_tx, rx) = watch::channel(false);

        let err = CaptureController::new(client.clone(), capture_config(out.path(), 10))
            .run(rx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Simulator(ActorFactoryError::SensorSpawnFailed { .. })
        ));

        let vehicle = spawned(&client, "vehicle.tesla.model3").unwrap();
        let lidar = spawned(&client, "sensor.lidar.ray_cast").unwrap();
        assert!(spawned(&client, "sensor.camera.rgb").is_none());

        let destroyed: Vec<ActorId> = client
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SimCall::Destroy(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed, vec![lidar, vehicle]);
        assert!(!client.calls().iter().any(|c| matches!(c, SimCall::Listen(_))));
    }

    /// LiDAR 挂载失败：相机从未创建，只销毁车辆
    #[tokio::test]
    async fn test_e2e_lidar_attach_failure() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig {
            fail_attach: vec!["sensor.lidar.ray_cast".to_string()],
            ..Default::default()
        });
        let (_tx, rx) = watch::channel(false);

        let err = CaptureController::new(client.clone(), capture_config(out.path(), 10))
            .run(rx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Simulator(ActorFactoryError::SensorSpawnFailed { .. })
        ));

        let vehicle = spawned(&client, "vehicle.tesla.model3").unwrap();
        assert!(!client
            .calls()
            .iter()
            .any(|c| matches!(c, SimCall::SpawnSensor { .. } | SimCall::Listen(_))));

        let destroyed: Vec<ActorId> = client
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SimCall::Destroy(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed, vec![vehicle]);
        assert_eq!(client.alive_actor_count(), 0);
    }

    /// 外部 despawn 的 actor 在 teardown 时跳过
    #[tokio::test]
    async fn test_e2e_external_despawn_skipped() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig::default());
        let (_tx, rx) = watch::channel(false);

        let controller = CaptureController::new(client.clone(), capture_config(out.path(), 50));
        let run = tokio::spawn(controller.run(rx));

        wait_for_listen(&client).await;
        let camera = spawned(&client, "sensor.camera.rgb").unwrap();
        client.despawn(camera);

        let stats = run.await.unwrap().unwrap();
        assert_eq!(stats.outcome, CaptureOutcome::Completed);
        assert_eq!(client.destroy_count(camera), 0);
        assert_eq!(stats.actors_skipped, 1);
        assert_eq!(stats.actors_destroyed, 2);
    }

    #[tokio::test]
    async fn test_e2e_unreachable_server() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig {
            unreachable: true,
            ..Default::default()
        });
        let (_tx, rx) = watch::channel(false);

        let err = CaptureController::new(client.clone(), capture_config(out.path(), 10))
            .run(rx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("failed to connect"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_e2e_vehicle_template_missing() {
        let out = tempdir().unwrap();
        let client = mock_client(MockConfig {
            catalog: vec![
                "sensor.lidar.ray_cast".to_string(),
                "sensor.camera.rgb".to_string(),
            ],
            ..Default::default()
        });
        let (_tx, rx) = watch::channel(false);

        let err = CaptureController::new(client.clone(), capture_config(out.path(), 10))
            .run(rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CaptureError::Simulator(ActorFactoryError::TemplateNotFound { .. })
        ));
        assert_eq!(client.actor_count(), 0);
    }
}
