//! # Integration Tests
//!
//! End-to-end tests of the driver against a loopback sensor.
//!
//! - [`fake_sensor`]: TCP command server and UDP data sender
//! - lifecycle over real sockets: configure, stream, reset, failure recovery
//! - parameter files routed to file sinks

pub mod fake_sensor;

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_default_parameters() {
        let params = contracts::Parameters::default();
        assert_eq!(params.lidar_port, 7502);
        assert_eq!(params.imu_port, 7503);
        assert_eq!(params.lidar_mode, "512x10");
        assert!(params.to_configuration().unwrap_err().is_fatal());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use contracts::{DriverMessage, ImuSample, Parameters, Topic};
    use dispatcher::{Dispatcher, MemorySink, MemorySinkReader, SinkHandle};
    use driver::{DriverOptions, LifecycleController, LifecycleState};
    use ingestion::MockSensor;

    use crate::fake_sensor::{free_udp_ports, revolution, DataSender, FakeOs1};

    const BEAMS: usize = 4;
    const RANGE_MM: u32 = 2_000;

    /// Real OS-1 source, publishers collected in memory
    fn controller(parameters: Parameters) -> (LifecycleController, MemorySinkReader) {
        let (sink, reader) = MemorySink::new("mem");
        let sink = Mutex::new(Some(sink));
        let controller = LifecycleController::builder(parameters)
            .dispatcher(move || {
                let handles = sink
                    .lock()
                    .unwrap()
                    .take()
                    .map(|s| vec![SinkHandle::spawn(s, 1024)])
                    .unwrap_or_default();
                Ok(Dispatcher::with_handles(handles))
            })
            .options(DriverOptions {
                cycle_period: Duration::from_millis(1),
                ..Default::default()
            })
            .build();
        (controller, reader)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..600 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn test_loopback_stream_publishes_products() {
        let fake = FakeOs1::start(BEAMS).await.unwrap();
        let (lidar_port, imu_port) = free_udp_ports().unwrap();
        let (mut controller, reader) = controller(fake.parameters(lidar_port, imu_port));

        controller.configure().await.unwrap();
        assert_eq!(fake.handshakes(), 1);
        let commands = fake.commands();
        assert_eq!(commands[0], "set_config_param udp_ip 127.0.0.1");
        assert!(commands.contains(&format!("set_config_param udp_port_lidar {lidar_port}")));
        assert!(commands.contains(&"set_config_param lidar_mode 512x10".to_string()));

        controller.activate().await.unwrap();
        let metadata = controller.services().get_metadata().unwrap();
        assert_eq!(metadata.beams(), BEAMS);
        assert_eq!(metadata.sensor_info.prod_sn, "fake-000001");

        let sender = DataSender::new(lidar_port, imu_port).unwrap();
        let mut columns = revolution(512, BEAMS, RANGE_MM, 1_000_000_000);
        columns.push(MockSensor::column(0, 1_100_000_000, BEAMS, RANGE_MM));
        sender.send_columns(&columns).unwrap();
        sender
            .send_imu(&ImuSample {
                sys_timestamp_ns: 1_050_000_000,
                accel: [0.0, 0.0, 1.0],
                gyro: [0.0, 0.0, 90.0],
                ..Default::default()
            })
            .unwrap();

        assert!(
            wait_until(|| reader.count(Topic::Points) == 1 && reader.count(Topic::Imu) == 1)
                .await,
            "frame and imu sample should arrive"
        );
        controller.deactivate().await.unwrap();
        let stats = controller.stats();
        assert_eq!(stats.cycle.frames_published, 1);
        assert_eq!(stats.cycle.incomplete_frames, 0);
        assert_eq!(stats.source.unwrap().datagrams_dropped, 0);

        for message in reader.messages() {
            match message {
                DriverMessage::RangeImage(image) => {
                    assert_eq!((image.height, image.width), (BEAMS, 512));
                    assert!(image.data.iter().all(|&r| r == RANGE_MM));
                    assert_eq!(image.header.stamp.sec, 1);
                }
                DriverMessage::Points(cloud) => {
                    assert_eq!(cloud.points.len(), BEAMS * 512);
                    assert_eq!(cloud.valid_points().count(), BEAMS * 512);
                    assert_eq!(cloud.header.frame_id, "laser_data_frame");
                }
                DriverMessage::Imu(imu) => {
                    assert!((imu.linear_acceleration.z - 9.80665).abs() < 1e-4);
                    assert!((imu.angular_velocity.z - std::f64::consts::FRAC_PI_2).abs() < 1e-4);
                    assert_eq!(imu.header.frame_id, "imu_data_frame");
                }
                DriverMessage::IntensityImage(_) | DriverMessage::NoiseImage(_) => {}
            }
        }

        // Sockets stay bound while inactive
        assert_eq!(controller.state(), LifecycleState::Inactive);
        assert!(controller.metadata().is_some());
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_loopback_reset_switches_mode() {
        let fake = FakeOs1::start(BEAMS).await.unwrap();
        let (lidar_port, imu_port) = free_udp_ports().unwrap();
        let (mut controller, reader) = controller(fake.parameters(lidar_port, imu_port));
        controller.configure().await.unwrap();
        controller.activate().await.unwrap();
        let services = controller.services();

        let mut params = (*services.parameters()).clone();
        params.lidar_mode = "1024x10".into();
        services.set_parameters(params).unwrap();
        services.reset().await.unwrap();

        assert_eq!(fake.handshakes(), 2);
        assert!(fake
            .commands()
            .contains(&"set_config_param lidar_mode 1024x10".to_string()));
        let metadata = services.get_metadata().unwrap();
        assert_eq!(metadata.columns_per_frame(), 1024);
        assert_eq!(metadata.sensor_info.prod_sn, "fake-000002");
        assert_eq!(controller.state(), LifecycleState::Active);

        let sender = DataSender::new(lidar_port, imu_port).unwrap();
        let mut columns = revolution(1024, BEAMS, RANGE_MM, 0);
        columns.push(MockSensor::column(0, 100_000_000, BEAMS, RANGE_MM));
        sender.send_columns(&columns).unwrap();

        assert!(wait_until(|| reader.count(Topic::RangeImage) == 1).await);
        let width = reader
            .messages()
            .into_iter()
            .find_map(|m| match m {
                DriverMessage::RangeImage(image) => Some(image.width),
                _ => None,
            })
            .unwrap();
        assert_eq!(width, 1024);
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_datagrams_are_counted() {
        let fake = FakeOs1::start(BEAMS).await.unwrap();
        let (lidar_port, imu_port) = free_udp_ports().unwrap();
        let (mut controller, reader) = controller(fake.parameters(lidar_port, imu_port));
        controller.configure().await.unwrap();
        controller.activate().await.unwrap();

        let sender = DataSender::new(lidar_port, imu_port).unwrap();
        sender.send_raw_lidar(&[0xAB; 37]).unwrap();

        assert!(
            wait_until(|| controller
                .stats()
                .source
                .is_some_and(|s| s.datagrams_dropped == 1))
            .await
        );
        assert_eq!(controller.state(), LifecycleState::Active);
        assert!(reader.is_empty());
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_handshake_then_external_configure() {
        let (lidar_port, imu_port) = free_udp_ports().unwrap();
        let fake = FakeOs1::start(BEAMS).await.unwrap();
        let mut params = fake.parameters(lidar_port, imu_port);
        let live_port = fake.tcp_port();

        // Nobody listens on the port of a dropped listener
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        params.tcp_port = closed.local_addr().unwrap().port();
        drop(closed);

        let (mut controller, _) = controller(params.clone());
        let err = controller.configure().await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(controller.state(), LifecycleState::ErrorProcessing);
        assert!(controller.metadata().is_none());

        params.tcp_port = live_port;
        controller.set_parameters(params).unwrap();
        controller.configure().await.unwrap();
        assert_eq!(controller.state(), LifecycleState::Inactive);
        assert_eq!(fake.handshakes(), 1);
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_parameter_file_routes_to_file_sink() {
        let fake = FakeOs1::start(BEAMS).await.unwrap();
        let (lidar_port, imu_port) = free_udp_ports().unwrap();
        let out = tempfile::tempdir().unwrap();

        let toml = format!(
            r#"
[driver]
lidar_ip = "127.0.0.1"
computer_ip = "127.0.0.1"
lidar_port = {lidar_port}
imu_port = {imu_port}
tcp_port = {tcp_port}
lidar_mode = "512x10"

[[sinks]]
name = "disk"
sink_type = "file"
topics = ["range_image", "points"]
params = {{ base_path = "{base}" }}
"#,
            tcp_port = fake.tcp_port(),
            base = out.path().display(),
        );
        let blueprint =
            config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
                .unwrap();

        let mut controller = LifecycleController::builder(blueprint.driver)
            .sinks(blueprint.sinks)
            .options(DriverOptions {
                cycle_period: Duration::from_millis(1),
                ..Default::default()
            })
            .build();
        controller.configure().await.unwrap();
        controller.activate().await.unwrap();

        let sender = DataSender::new(lidar_port, imu_port).unwrap();
        let mut columns = revolution(512, BEAMS, RANGE_MM, 0);
        columns.push(MockSensor::column(0, 100_000_000, BEAMS, RANGE_MM));
        sender.send_columns(&columns).unwrap();

        assert!(wait_until(|| controller.stats().cycle.frames_published == 1).await);
        controller.deactivate().await.unwrap();
        // Shutting down drains the sink queues
        controller.shutdown().await.unwrap();

        let range = out.path().join("range_image");
        let points = out.path().join("points");
        assert_eq!(std::fs::read_dir(&range).unwrap().count(), 1);
        assert_eq!(std::fs::read_dir(&points).unwrap().count(), 1);
        assert!(!out.path().join("imu").exists());
    }
}
