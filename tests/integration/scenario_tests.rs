//! End-to-end scenarios over the full session pipeline.

use cube_streamer::comp::codec;
use cube_streamer::proto::{
    event, CompressionType, HistogramConfig, ImageBounds, Point, RasterImageData,
    RegionHistogramData, SetCursor, SetHistogramRequirements, SetImageChannels, SetImageView,
    SetSpatialRequirements, SetSpectralRequirements, SpatialProfileData, SpectralConfig,
    SpectralProfileData, StatsType,
};
use cube_streamer::WHOLE_IMAGE_REGION_ID;

use super::test_utils::{
    cube_provider, f32s_from_le, gradient_provider, i32s_from_le, ramp_provider,
    register_and_open, TestClient,
};

fn full_view(file_id: i32, size: i32, mip: i32, compression: CompressionType) -> SetImageView {
    SetImageView {
        file_id,
        image_bounds: Some(ImageBounds {
            x_min: 0,
            x_max: size,
            y_min: 0,
            y_max: size,
        }),
        mip,
        compression_type: compression as i32,
        compression_quality: 24.0,
        num_subsets: 4,
    }
}

#[tokio::test]
async fn scenario_open_and_view_2d_uncompressed() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(event::SET_IMAGE_VIEW, 3, &full_view(0, 64, 1, CompressionType::None))
        .await;
    let (request_id, raster): (_, RasterImageData) = client.recv_expect(event::RASTER_IMAGE_DATA);
    assert_eq!(request_id, 3);
    assert_eq!(raster.channel, 0);
    assert_eq!(raster.stokes, 0);
    assert_eq!(raster.mip, 1);
    assert_eq!(raster.compression_type, CompressionType::None as i32);

    // one raw block of 64 * 64 floats, row-major values x + y
    assert_eq!(raster.image_data.len(), 1);
    assert_eq!(raster.image_data[0].len(), 64 * 64 * 4);
    let values = f32s_from_le(&raster.image_data[0]);
    assert_eq!(values[0], 0.0);
    assert_eq!(values[63], 63.0);
    assert_eq!(values[64], 1.0);
    assert_eq!(values[64 * 64 - 1], 126.0);

    // a clean plane encodes as a single finite run
    assert_eq!(raster.nan_encodings.len(), 1);
    assert_eq!(i32s_from_le(&raster.nan_encodings[0]), vec![4096]);

    // the embedded histogram matches the plane
    let histogram_data = raster.channel_histogram_data.expect("embedded histogram");
    assert_eq!(histogram_data.region_id, WHOLE_IMAGE_REGION_ID);
    let histogram = &histogram_data.histograms[0];
    assert_eq!(histogram.channel, 0);
    assert_eq!(histogram.bins.iter().sum::<i64>(), 4096);
    assert!((histogram.first_bin_center - 0.5 * histogram.bin_width).abs() < 1e-6);
    client.assert_idle();
}

#[tokio::test]
async fn scenario_lossy_raster_round_trips() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(
            event::SET_IMAGE_VIEW,
            3,
            &full_view(0, 64, 1, CompressionType::LossyFloat),
        )
        .await;
    let (_, raster): (_, RasterImageData) = client.recv_expect(event::RASTER_IMAGE_DATA);
    assert_eq!(raster.compression_type, CompressionType::LossyFloat as i32);
    assert_eq!(raster.image_data.len(), 4);
    assert_eq!(raster.nan_encodings.len(), 4);

    // quality 24 passes floats through bit-exact, so the bands reassemble
    // into the original plane
    let mut restored = Vec::new();
    for (block, encoding) in raster.image_data.iter().zip(&raster.nan_encodings) {
        let mut band = codec::decompress_block(block).unwrap();
        codec::apply_nan_encodings(&mut band, &i32s_from_le(encoding));
        restored.extend(band);
    }
    assert_eq!(restored.len(), 64 * 64);
    for (i, value) in restored.iter().enumerate() {
        let (x, y) = (i % 64, i / 64);
        assert_eq!(*value, (x + y) as f32);
    }
}

#[tokio::test]
async fn scenario_mip_view_downsamples() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    client
        .send(event::SET_IMAGE_VIEW, 3, &full_view(0, 64, 4, CompressionType::None))
        .await;
    let (_, raster): (_, RasterImageData) = client.recv_expect(event::RASTER_IMAGE_DATA);
    assert_eq!(raster.mip, 4);
    let values = f32s_from_le(&raster.image_data[0]);
    assert_eq!(values.len(), 16 * 16);
    // mean of the 4x4 block at origin: values x+y for x,y in 0..4 -> 3.0
    assert_eq!(values[0], 3.0);
}

#[tokio::test]
async fn scenario_channel_switch_emits_matched_histogram() {
    let mut client = TestClient::new(cube_provider());
    register_and_open(&mut client, "cube.fits", 1).await;

    client
        .send(
            event::SET_IMAGE_CHANNELS,
            5,
            &SetImageChannels {
                file_id: 1,
                channel: 2,
                stokes: 0,
            },
        )
        .await;
    let (_, raster): (_, RasterImageData) = client.recv_expect(event::RASTER_IMAGE_DATA);
    assert_eq!(raster.channel, 2);
    let histogram_data = raster.channel_histogram_data.expect("embedded histogram");
    assert_eq!(histogram_data.histograms[0].channel, 2);

    // stokes switches couple the same way
    client
        .send(
            event::SET_IMAGE_CHANNELS,
            6,
            &SetImageChannels {
                file_id: 1,
                channel: 1,
                stokes: 1,
            },
        )
        .await;
    let (_, raster): (_, RasterImageData) = client.recv_expect(event::RASTER_IMAGE_DATA);
    assert_eq!((raster.channel, raster.stokes), (1, 1));
    assert_eq!(
        raster.channel_histogram_data.unwrap().histograms[0].channel,
        1
    );
}

#[tokio::test]
async fn scenario_rasters_follow_request_order() {
    let mut client = TestClient::new(cube_provider());
    register_and_open(&mut client, "cube.fits", 1).await;

    for (request_id, channel) in [(10u32, 0), (11, 1), (12, 2)] {
        client
            .send(
                event::SET_IMAGE_CHANNELS,
                request_id,
                &SetImageChannels {
                    file_id: 1,
                    channel,
                    stokes: 0,
                },
            )
            .await;
    }
    for (request_id, channel) in [(10u32, 0), (11, 1), (12, 2)] {
        let (got_id, raster): (_, RasterImageData) =
            client.recv_expect(event::RASTER_IMAGE_DATA);
        assert_eq!(got_id, request_id);
        assert_eq!(raster.channel, channel);
    }
}

#[tokio::test]
async fn scenario_histogram_requirements_memoized() {
    let mut client = TestClient::new(ramp_provider());
    register_and_open(&mut client, "ramp.fits", 0).await;

    let requirements = SetHistogramRequirements {
        file_id: 0,
        region_id: WHOLE_IMAGE_REGION_ID,
        histograms: vec![HistogramConfig {
            channel: 0,
            num_bins: -1,
        }],
    };
    client
        .send(event::SET_HISTOGRAM_REQUIREMENTS, 7, &requirements)
        .await;
    let (_, first): (_, RegionHistogramData) = client.recv_expect(event::REGION_HISTOGRAM_DATA);

    client
        .send(event::SET_HISTOGRAM_REQUIREMENTS, 8, &requirements)
        .await;
    let (_, second): (_, RegionHistogramData) = client.recv_expect(event::REGION_HISTOGRAM_DATA);

    assert_eq!(first, second);
    assert_eq!(first.histograms[0].bins.iter().sum::<i64>(), 4096);
}

#[tokio::test]
async fn scenario_all_channels_histograms() {
    let mut client = TestClient::new(cube_provider());
    register_and_open(&mut client, "cube.fits", 1).await;

    client
        .send(
            event::SET_HISTOGRAM_REQUIREMENTS,
            7,
            &SetHistogramRequirements {
                file_id: 1,
                region_id: WHOLE_IMAGE_REGION_ID,
                histograms: vec![HistogramConfig {
                    channel: -2,
                    num_bins: 8,
                }],
            },
        )
        .await;
    let (_, data): (_, RegionHistogramData) = client.recv_expect(event::REGION_HISTOGRAM_DATA);
    assert_eq!(data.histograms.len(), 3);
    for (channel, histogram) in data.histograms.iter().enumerate() {
        assert_eq!(histogram.channel, channel as i32);
        assert_eq!(histogram.bins.iter().sum::<i64>(), 64);
    }
}

#[tokio::test]
async fn scenario_cursor_profiles() {
    let mut client = TestClient::new(gradient_provider());
    register_and_open(&mut client, "grid.fits", 0).await;

    // moving the cursor before any requirements are set emits nothing
    client
        .send(
            event::SET_CURSOR,
            4,
            &SetCursor {
                file_id: 0,
                point: Some(Point { x: 3.0, y: 4.0 }),
            },
        )
        .await;
    client.assert_idle();

    client
        .send(
            event::SET_SPATIAL_REQUIREMENTS,
            5,
            &SetSpatialRequirements {
                file_id: 0,
                region_id: 0,
                spatial_profiles: vec!["x".into(), "y".into()],
            },
        )
        .await;
    let (_, data): (_, SpatialProfileData) = client.recv_expect(event::SPATIAL_PROFILE_DATA);
    assert_eq!((data.x, data.y), (3, 4));
    assert_eq!(data.value, 43.0);
    assert_eq!(data.profiles.len(), 2);
    assert_eq!(data.profiles[0].coordinate, "x");
    assert_eq!(
        data.profiles[0].values,
        (40..50).map(|v| v as f32).collect::<Vec<_>>()
    );
    assert_eq!((data.profiles[0].start, data.profiles[0].end), (0, 10));
    assert_eq!(
        data.profiles[1].values,
        vec![3.0, 13.0, 23.0, 33.0, 43.0, 53.0, 63.0, 73.0, 83.0, 93.0]
    );

    // subsequent cursor moves re-emit with the registered requirements
    client
        .send(
            event::SET_CURSOR,
            6,
            &SetCursor {
                file_id: 0,
                point: Some(Point { x: 5.0, y: 5.0 }),
            },
        )
        .await;
    let (_, data): (_, SpatialProfileData) = client.recv_expect(event::SPATIAL_PROFILE_DATA);
    assert_eq!(data.value, 55.0);
}

#[tokio::test]
async fn scenario_spectral_profile_at_cursor() {
    let mut client = TestClient::new(cube_provider());
    register_and_open(&mut client, "cube.fits", 1).await;

    client
        .send(
            event::SET_CURSOR,
            4,
            &SetCursor {
                file_id: 1,
                point: Some(Point { x: 2.0, y: 3.0 }),
            },
        )
        .await;
    client.assert_idle();

    client
        .send(
            event::SET_SPECTRAL_REQUIREMENTS,
            5,
            &SetSpectralRequirements {
                file_id: 1,
                region_id: 0,
                spectral_profiles: vec![SpectralConfig {
                    coordinate: "z".into(),
                    stats_types: vec![StatsType::Sum as i32, StatsType::Mean as i32],
                }],
            },
        )
        .await;
    let (_, data): (_, SpectralProfileData) = client.recv_expect(event::SPECTRAL_PROFILE_DATA);
    assert_eq!(data.profiles.len(), 2);
    // cursor pixel (2, 3) holds 32 + 100c; a point's sum equals its mean
    assert_eq!(data.profiles[0].values, vec![32.0, 132.0, 232.0]);
    assert_eq!(data.profiles[1].values, vec![32.0, 132.0, 232.0]);
}
