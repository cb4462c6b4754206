//! Dispatcher behavior: registration, errors, regions and teardown.

use std::sync::Arc;

use cube_streamer::proto::{
    event, CloseFile, CompressionType, ErrorData, HistogramConfig, ImageBounds, OpenFile,
    OpenFileAck, Point, RasterImageData, RegionHistogramData, RegionType, RegisterViewer,
    RegisterViewerAck, RemoveRegion, SetHistogramRequirements, SetImageChannels, SetImageView,
    SetRegion, SetRegionAck,
};
use cube_streamer::AccessPolicy;

use super::test_utils::{cube_provider, ramp_provider, register_and_open, TestClient};

fn full_view(file_id: i32) -> SetImageView {
    SetImageView {
        file_id,
        image_bounds: Some(ImageBounds {
            x_min: 0,
            x_max: 64,
            y_min: 0,
            y_max: 64,
        }),
        mip: 1,
        compression_type: CompressionType::None as i32,
        compression_quality: 0.0,
        num_subsets: 4,
    }
}

#[tokio::test]
async fn test_register_viewer_ack() {
    let mut client = TestClient::new(ramp_provider());
    client
        .send(
            event::REGISTER_VIEWER,
            9,
            &RegisterViewer {
                api_key: "key".into(),
            },
        )
        .await;
    let (request_id, ack): (_, RegisterViewerAck) =
        client.recv_expect(event::REGISTER_VIEWER_ACK);
    assert_eq!(request_id, 9);
    assert!(ack.success);
    assert!(!ack.session_id.is_empty());
}

#[tokio::test]
async fn test_unknown_event_is_dropped() {
    let mut client = TestClient::new(ramp_provider());
    client
        .send(
            "NOT_A_REAL_EVENT",
            1,
            &RegisterViewer {
                api_key: String::new(),
            },
        )
        .await;
    client.assert_idle();
}

#[tokio::test]
async fn test_undecodable_payload_is_dropped() {
    let mut client = TestClient::new(ramp_provider());
    // 40-byte header for OPEN_FILE followed by an invalid protobuf payload
    let mut frame = vec![0u8; 40];
    frame[..9].copy_from_slice(b"OPEN_FILE");
    frame.push(0xFF);
    client.send_raw(&frame).await;
    client.assert_idle();
}

#[tokio::test]
async fn test_undersized_frame_is_dropped() {
    let mut client = TestClient::new(ramp_provider());
    client.send_raw(&[1, 2, 3]).await;
    client.assert_idle();
}

#[tokio::test]
async fn test_open_unknown_file_acks_failure() {
    let mut client = TestClient::new(ramp_provider());
    client
        .send(
            event::OPEN_FILE,
            2,
            &OpenFile {
                directory: String::new(),
                file: "absent.fits".into(),
                hdu: String::new(),
                file_id: 0,
            },
        )
        .await;
    let (_, ack): (_, OpenFileAck) = client.recv_expect(event::OPEN_FILE_ACK);
    assert!(!ack.success);
    assert!(!ack.message.is_empty());
}

#[tokio::test]
async fn test_policy_denies_open() {
    struct DenyAll;
    impl AccessPolicy for DenyAll {
        fn is_directory_readable(&self, _: &str, _: &str) -> bool {
            false
        }
        fn is_entry_readable(&self, _: &str, _: &str) -> bool {
            false
        }
    }

    let mut client = TestClient::with_policy(ramp_provider(), Arc::new(DenyAll));
    client
        .send(
            event::OPEN_FILE,
            2,
            &OpenFile {
                directory: String::new(),
                file: "ramp.fits".into(),
                hdu: String::new(),
                file_id: 0,
            },
        )
        .await;
    let (_, ack): (_, OpenFileAck) = client.recv_expect(event::OPEN_FILE_ACK);
    assert!(!ack.success);
    assert!(ack.message.contains("Permission denied"));
}

#[tokio::test]
async fn test_request_on_unopened_file_errors() {
    let mut client = TestClient::new(ramp_provider());
    client
        .send(
            event::SET_IMAGE_CHANNELS,
            3,
            &SetImageChannels {
                file_id: 7,
                channel: 0,
                stokes: 0,
            },
        )
        .await;
    let (request_id, error): (_, ErrorData) = client.recv_expect(event::ERROR_DATA);
    assert_eq!(request_id, 3);
    assert!(error.message.contains("not open"));
    assert_eq!(error.tags, vec!["set_image_channels".to_string()]);
}

#[tokio::test]
async fn test_invalid_channel_errors_without_state_change() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(
            event::SET_IMAGE_CHANNELS,
            3,
            &SetImageChannels {
                file_id: 0,
                channel: 5,
                stokes: 0,
            },
        )
        .await;
    let (_, error): (_, ErrorData) = client.recv_expect(event::ERROR_DATA);
    assert!(error.message.contains("Channel 5"));

    // the frame still answers raster requests on its original plane
    client.send(event::SET_IMAGE_VIEW, 4, &full_view(0)).await;
    let (_, raster): (_, RasterImageData) = client.recv_expect(event::RASTER_IMAGE_DATA);
    assert_eq!(raster.channel, 0);
}

#[tokio::test]
async fn test_bounds_outside_image_error() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    let mut view = full_view(0);
    view.image_bounds = Some(ImageBounds {
        x_min: 0,
        x_max: 65,
        y_min: 0,
        y_max: 64,
    });
    client.send(event::SET_IMAGE_VIEW, 3, &view).await;
    let (_, error): (_, ErrorData) = client.recv_expect(event::ERROR_DATA);
    assert!(error.message.contains("Bounds"));
    client.assert_idle();
}

#[tokio::test]
async fn test_close_file_releases_frame() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(event::CLOSE_FILE, 3, &CloseFile { file_id: 0 })
        .await;
    client.assert_idle();

    client.send(event::SET_IMAGE_VIEW, 4, &full_view(0)).await;
    let (_, error): (_, ErrorData) = client.recv_expect(event::ERROR_DATA);
    assert!(error.message.contains("not open"));
}

#[tokio::test]
async fn test_close_all_files() {
    let mut client = TestClient::new(cube_provider());
    register_and_open(&mut client, "cube.fits", 1).await;

    client
        .send(event::CLOSE_FILE, 3, &CloseFile { file_id: -1 })
        .await;
    client
        .send(
            event::SET_IMAGE_CHANNELS,
            4,
            &SetImageChannels {
                file_id: 1,
                channel: 0,
                stokes: 0,
            },
        )
        .await;
    let (_, _error): (_, ErrorData) = client.recv_expect(event::ERROR_DATA);
}

#[tokio::test]
async fn test_set_region_ack_and_histograms() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(
            event::SET_REGION,
            3,
            &SetRegion {
                file_id: 0,
                region_id: 1,
                region_name: "box".into(),
                region_type: RegionType::Rectangle as i32,
                channel_min: 0,
                channel_max: 0,
                stokes: vec![0],
                control_points: vec![
                    Point { x: 10.0, y: 10.0 },
                    Point { x: 4.0, y: 4.0 },
                ],
                rotation: 0.0,
            },
        )
        .await;
    let (_, ack): (_, SetRegionAck) = client.recv_expect(event::SET_REGION_ACK);
    assert!(ack.success);
    client.assert_idle();

    client
        .send(
            event::SET_HISTOGRAM_REQUIREMENTS,
            4,
            &SetHistogramRequirements {
                file_id: 0,
                region_id: 1,
                histograms: vec![HistogramConfig {
                    channel: -1,
                    num_bins: 8,
                }],
            },
        )
        .await;
    let (_, data): (_, RegionHistogramData) = client.recv_expect(event::REGION_HISTOGRAM_DATA);
    assert_eq!(data.region_id, 1);
    // the 4x4 box centered at (10,10) covers a 5x5 pixel window
    assert_eq!(data.histograms[0].bins.iter().sum::<i64>(), 25);

    // updating the region geometry re-emits its histograms
    client
        .send(
            event::SET_REGION,
            5,
            &SetRegion {
                file_id: 0,
                region_id: 1,
                region_name: "box".into(),
                region_type: RegionType::Rectangle as i32,
                channel_min: 0,
                channel_max: 0,
                stokes: vec![0],
                control_points: vec![
                    Point { x: 20.0, y: 20.0 },
                    Point { x: 2.0, y: 2.0 },
                ],
                rotation: 0.0,
            },
        )
        .await;
    let (_, ack): (_, SetRegionAck) = client.recv_expect(event::SET_REGION_ACK);
    assert!(ack.success);
    let (_, data): (_, RegionHistogramData) = client.recv_expect(event::REGION_HISTOGRAM_DATA);
    assert_eq!(data.histograms[0].bins.iter().sum::<i64>(), 9);
}

#[tokio::test]
async fn test_histogram_requirements_for_unknown_region() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(
            event::SET_HISTOGRAM_REQUIREMENTS,
            3,
            &SetHistogramRequirements {
                file_id: 0,
                region_id: 42,
                histograms: vec![],
            },
        )
        .await;
    let (_, error): (_, ErrorData) = client.recv_expect(event::ERROR_DATA);
    assert!(error.message.contains("Region 42"));
}

#[tokio::test]
async fn test_remove_region() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(
            event::SET_REGION,
            3,
            &SetRegion {
                file_id: 0,
                region_id: 2,
                region_name: "p".into(),
                region_type: RegionType::Point as i32,
                channel_min: 0,
                channel_max: 0,
                stokes: vec![0],
                control_points: vec![Point { x: 1.0, y: 1.0 }],
                rotation: 0.0,
            },
        )
        .await;
    let (_, ack): (_, SetRegionAck) = client.recv_expect(event::SET_REGION_ACK);
    assert!(ack.success);

    client
        .send(
            event::REMOVE_REGION,
            4,
            &RemoveRegion {
                file_id: 0,
                region_id: 2,
            },
        )
        .await;
    client.assert_idle();

    client
        .send(
            event::SET_HISTOGRAM_REQUIREMENTS,
            5,
            &SetHistogramRequirements {
                file_id: 0,
                region_id: 2,
                histograms: vec![],
            },
        )
        .await;
    let (_, _error): (_, ErrorData) = client.recv_expect(event::ERROR_DATA);
}

#[tokio::test]
async fn test_reserved_region_id_rejected() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(
            event::SET_REGION,
            3,
            &SetRegion {
                file_id: 0,
                region_id: -1,
                region_name: String::new(),
                region_type: RegionType::Rectangle as i32,
                channel_min: 0,
                channel_max: 0,
                stokes: vec![],
                control_points: vec![],
                rotation: 0.0,
            },
        )
        .await;
    let (_, ack): (_, SetRegionAck) = client.recv_expect(event::SET_REGION_ACK);
    assert!(!ack.success);
}

#[tokio::test]
async fn test_session_close_is_quiet() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;
    client.send(event::SET_IMAGE_VIEW, 3, &full_view(0)).await;
    let (_, _raster): (_, RasterImageData) = client.recv_expect(event::RASTER_IMAGE_DATA);

    client.session_mut().close();
    client.assert_idle();
}
