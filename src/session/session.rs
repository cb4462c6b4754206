//! Per-connection session dispatcher.
//!
//! One session owns the frames opened over a connection, routes decoded
//! events to them, and frames every response onto the outbound channel.
//! Responses go out in the order requests were accepted; CPU-heavy raster
//! compression is fanned out over the process-wide worker pool with the
//! session's task tag, so disconnecting withdraws any queued bands.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use prost::Message;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::comp::{self, codec, WorkerPool};
use crate::error::{FrameError, SessionError};
use crate::frame::Frame;
use crate::image::{detect_format, PixelBounds, SourceProvider};
use crate::proto::{
    self, event, CloseFile, CompressionType, ErrorData, ErrorSeverity, EventHeader, FileInfo,
    FileInfoExtended, FileInfoRequest, FileListRequest, FileType, ImageBounds, OpenFile,
    OpenFileAck, RasterImageData, RegionHistogramData, RegionType, RegisterViewer,
    RegisterViewerAck, RemoveRegion, SetCursor, SetHistogramRequirements, SetImageChannels,
    SetImageView, SetRegion, SetRegionAck, SetSpatialRequirements, SetSpectralRequirements,
};
use crate::region::{CURSOR_REGION_ID, WHOLE_IMAGE_REGION_ID};
use crate::server::{browser, AccessPolicy};

static NEXT_SESSION_TAG: AtomicU64 = AtomicU64::new(1);

/// Compression parameters captured from the latest `SET_IMAGE_VIEW`.
#[derive(Debug, Clone, Copy)]
pub struct CompressionSettings {
    pub kind: CompressionType,
    pub quality: f32,
    pub num_subsets: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            kind: CompressionType::None,
            quality: comp::DEFAULT_PRECISION as f32,
            num_subsets: 4,
        }
    }
}

pub struct Session {
    id: Uuid,
    short_id: String,
    tag: u64,
    api_key: String,
    base_folder: PathBuf,
    provider: Arc<dyn SourceProvider>,
    policy: Arc<dyn AccessPolicy>,
    pool: Arc<WorkerPool>,
    frames: HashMap<i32, Frame>,
    compression: CompressionSettings,
    outbound: mpsc::Sender<Bytes>,
    send_buf: BytesMut,
    raster_seq: i32,
}

fn task_id(tag: u64, file_id: i32) -> u64 {
    (tag << 16) | (file_id as u16 as u64)
}

/// Decode a payload, logging and swallowing malformed ones: a request that
/// fails to parse is dropped without a response.
fn decode<M: Message + Default>(name: &str, payload: &[u8]) -> Option<M> {
    match M::decode(payload) {
        Ok(msg) => Some(msg),
        Err(err) => {
            warn!(event = name, error = %err, "dropping undecodable payload");
            None
        }
    }
}

impl Session {
    pub fn new(
        id: Uuid,
        provider: Arc<dyn SourceProvider>,
        policy: Arc<dyn AccessPolicy>,
        pool: Arc<WorkerPool>,
        base_folder: PathBuf,
        outbound: mpsc::Sender<Bytes>,
    ) -> Self {
        let id_string = id.to_string();
        let short_id = id_string
            .rsplit('-')
            .next()
            .unwrap_or(&id_string)
            .to_string();
        Self {
            id,
            short_id,
            tag: NEXT_SESSION_TAG.fetch_add(1, Ordering::Relaxed),
            api_key: String::new(),
            base_folder,
            provider,
            policy,
            pool,
            frames: HashMap::new(),
            compression: CompressionSettings::default(),
            outbound,
            send_buf: BytesMut::new(),
            raster_seq: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle one inbound frame. Returns an error only for fatal
    /// conditions; everything else is answered or dropped here.
    pub async fn on_message(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        let (header, payload) = match proto::decode_frame(frame) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(session = %self.short_id, error = %err, "dropping malformed frame");
                return Ok(());
            }
        };
        debug!(session = %self.short_id, event = %header.name, request_id = header.request_id, "request");

        match self.dispatch(&header, payload).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => {
                error!(session = %self.short_id, event = %header.name, error = %err, "fatal error");
                Err(err)
            }
            Err(SessionError::Cancelled) => Ok(()),
            Err(err) => {
                warn!(session = %self.short_id, event = %header.name, error = %err, "request failed");
                match self.send_error(&header.name, header.request_id, &err).await {
                    Ok(()) | Err(SessionError::Cancelled) => Ok(()),
                    Err(fatal) => Err(fatal),
                }
            }
        }
    }

    /// Tear down every frame and withdraw any queued pool work.
    pub fn close(&mut self) {
        for (file_id, mut frame) in self.frames.drain() {
            frame.close();
            self.pool.remove_by_id(task_id(self.tag, file_id));
        }
        debug!(session = %self.short_id, "session closed");
    }

    // =========================================================================
    // Routing
    // =========================================================================

    async fn dispatch(&mut self, header: &EventHeader, payload: &[u8]) -> Result<(), SessionError> {
        let request_id = header.request_id;
        let name = header.name.as_str();
        match name {
            event::REGISTER_VIEWER => match decode::<RegisterViewer>(name, payload) {
                Some(msg) => self.on_register_viewer(msg, request_id).await,
                None => Ok(()),
            },
            event::FILE_LIST_REQUEST => match decode::<FileListRequest>(name, payload) {
                Some(msg) => self.on_file_list(msg, request_id).await,
                None => Ok(()),
            },
            event::FILE_INFO_REQUEST => match decode::<FileInfoRequest>(name, payload) {
                Some(msg) => self.on_file_info(msg, request_id).await,
                None => Ok(()),
            },
            event::OPEN_FILE => match decode::<OpenFile>(name, payload) {
                Some(msg) => self.on_open_file(msg, request_id).await,
                None => Ok(()),
            },
            event::CLOSE_FILE => match decode::<CloseFile>(name, payload) {
                Some(msg) => self.on_close_file(msg).await,
                None => Ok(()),
            },
            event::SET_IMAGE_VIEW => match decode::<SetImageView>(name, payload) {
                Some(msg) => self.on_set_image_view(msg, request_id).await,
                None => Ok(()),
            },
            event::SET_IMAGE_CHANNELS => match decode::<SetImageChannels>(name, payload) {
                Some(msg) => self.on_set_image_channels(msg, request_id).await,
                None => Ok(()),
            },
            event::SET_REGION => match decode::<SetRegion>(name, payload) {
                Some(msg) => self.on_set_region(msg, request_id).await,
                None => Ok(()),
            },
            event::REMOVE_REGION => match decode::<RemoveRegion>(name, payload) {
                Some(msg) => self.on_remove_region(msg).await,
                None => Ok(()),
            },
            event::SET_CURSOR => match decode::<SetCursor>(name, payload) {
                Some(msg) => self.on_set_cursor(msg, request_id).await,
                None => Ok(()),
            },
            event::SET_HISTOGRAM_REQUIREMENTS => {
                match decode::<SetHistogramRequirements>(name, payload) {
                    Some(msg) => self.on_set_histogram_requirements(msg, request_id).await,
                    None => Ok(()),
                }
            }
            event::SET_SPATIAL_REQUIREMENTS => {
                match decode::<SetSpatialRequirements>(name, payload) {
                    Some(msg) => self.on_set_spatial_requirements(msg, request_id).await,
                    None => Ok(()),
                }
            }
            event::SET_SPECTRAL_REQUIREMENTS => {
                match decode::<SetSpectralRequirements>(name, payload) {
                    Some(msg) => self.on_set_spectral_requirements(msg, request_id).await,
                    None => Ok(()),
                }
            }
            _ => {
                warn!(session = %self.short_id, event = name, "unknown event type");
                Ok(())
            }
        }
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    async fn on_register_viewer(
        &mut self,
        msg: RegisterViewer,
        request_id: u32,
    ) -> Result<(), SessionError> {
        self.api_key = msg.api_key;
        info!(session = %self.short_id, "viewer registered");
        let ack = RegisterViewerAck {
            session_id: self.id.to_string(),
            success: true,
        };
        self.send_event(event::REGISTER_VIEWER_ACK, request_id, &ack)
            .await
    }

    async fn on_file_list(
        &mut self,
        msg: FileListRequest,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let response = browser::file_list(
            &self.base_folder,
            &msg.directory,
            self.policy.as_ref(),
            &self.api_key,
        );
        self.send_event(event::FILE_LIST_RESPONSE, request_id, &response)
            .await
    }

    async fn on_file_info(
        &mut self,
        msg: FileInfoRequest,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let response =
            browser::file_info(&self.base_folder, &msg, self.policy.as_ref(), &self.api_key);
        self.send_event(event::FILE_INFO_RESPONSE, request_id, &response)
            .await
    }

    async fn on_open_file(&mut self, msg: OpenFile, request_id: u32) -> Result<(), SessionError> {
        let entry = if msg.directory.is_empty() {
            msg.file.clone()
        } else {
            format!("{}/{}", msg.directory.trim_matches('/'), msg.file)
        };

        let mut ack = OpenFileAck {
            file_id: msg.file_id,
            ..Default::default()
        };

        if !self.policy.is_entry_readable(&entry, &self.api_key) {
            ack.message = "Permission denied".into();
            return self.send_event(event::OPEN_FILE_ACK, request_id, &ack).await;
        }

        match self.provider.open(&msg.directory, &msg.file, &msg.hdu).await {
            Err(err) => {
                info!(session = %self.short_id, file = %msg.file, error = %err, "open failed");
                ack.message = err.to_string();
            }
            Ok(source) => match Frame::open(self.short_id.clone(), source, 0).await {
                Err(err) => {
                    info!(session = %self.short_id, file = %msg.file, error = %err, "open failed");
                    ack.message = err.to_string();
                }
                Ok(frame) => {
                    let shape = *frame.shape();
                    if let Some(mut old) = self.frames.remove(&msg.file_id) {
                        old.close();
                    }
                    self.frames.insert(msg.file_id, frame);

                    let path = self.base_folder.join(entry.trim_start_matches('/'));
                    let size = std::fs::metadata(&path).map(|m| m.len() as i64).unwrap_or(0);
                    ack.success = true;
                    ack.file_info = Some(FileInfo {
                        name: msg.file.clone(),
                        r#type: if path.exists() {
                            browser_file_type(&path)
                        } else {
                            FileType::Unknown as i32
                        },
                        size,
                        hdu_list: vec![msg.hdu.clone()],
                    });
                    ack.file_info_extended = Some(FileInfoExtended {
                        dimensions: shape.ndims as i32,
                        width: shape.width as i32,
                        height: shape.height as i32,
                        depth: shape.depth as i32,
                        stokes: shape.stokes as i32,
                    });
                }
            },
        }
        self.send_event(event::OPEN_FILE_ACK, request_id, &ack).await
    }

    async fn on_close_file(&mut self, msg: CloseFile) -> Result<(), SessionError> {
        if msg.file_id == -1 {
            self.close();
        } else if let Some(mut frame) = self.frames.remove(&msg.file_id) {
            frame.close();
            self.pool.remove_by_id(task_id(self.tag, msg.file_id));
        }
        Ok(())
    }

    async fn on_set_image_view(
        &mut self,
        msg: SetImageView,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let kind = CompressionType::try_from(msg.compression_type)
            .map_err(|_| SessionError::InvalidRequest("unknown compression type".into()))?;
        let bounds_msg = msg
            .image_bounds
            .ok_or_else(|| SessionError::InvalidRequest("missing image bounds".into()))?;

        let frame = self
            .frames
            .get_mut(&msg.file_id)
            .ok_or(SessionError::FileNotFound {
                file_id: msg.file_id,
            })?;
        let bounds = PixelBounds::from_wire(
            bounds_msg.x_min,
            bounds_msg.y_min,
            bounds_msg.x_max,
            bounds_msg.y_max,
            frame.shape(),
        )?;
        frame.set_bounds(bounds, msg.mip)?;

        self.compression = CompressionSettings {
            kind,
            quality: msg.compression_quality,
            num_subsets: msg.num_subsets.clamp(1, comp::MAX_SUBSETS as i32) as usize,
        };
        self.send_raster(msg.file_id, request_id).await
    }

    async fn on_set_image_channels(
        &mut self,
        msg: SetImageChannels,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let frame = self
            .frames
            .get_mut(&msg.file_id)
            .ok_or(SessionError::FileNotFound {
                file_id: msg.file_id,
            })?;
        frame.set_channels(msg.channel, msg.stokes).await?;
        self.send_raster(msg.file_id, request_id).await
    }

    async fn on_set_region(&mut self, msg: SetRegion, request_id: u32) -> Result<(), SessionError> {
        let frame = self
            .frames
            .get_mut(&msg.file_id)
            .ok_or(SessionError::FileNotFound {
                file_id: msg.file_id,
            })?;
        let kind = RegionType::try_from(msg.region_type)
            .map_err(|_| SessionError::InvalidRequest("unknown region type".into()))?;
        let points: Vec<(f64, f64)> = msg
            .control_points
            .iter()
            .map(|p| (p.x as f64, p.y as f64))
            .collect();

        let result = frame.set_region(
            msg.region_id,
            &msg.region_name,
            kind,
            points,
            msg.rotation,
            msg.channel_min,
            msg.channel_max,
            msg.stokes.clone(),
        );
        let ack = SetRegionAck {
            region_id: msg.region_id,
            success: result.is_ok(),
            message: result.as_ref().err().map(|e| e.to_string()).unwrap_or_default(),
        };
        self.send_event(event::SET_REGION_ACK, request_id, &ack).await?;

        let has_configs = self
            .frames
            .get(&msg.file_id)
            .and_then(|f| f.region_ref(msg.region_id))
            .map(|r| !r.stats_ref().configs().is_empty())
            .unwrap_or(false);
        if result.is_ok() && has_configs {
            self.send_region_histograms(msg.file_id, msg.region_id, request_id)
                .await?;
        }
        Ok(())
    }

    async fn on_remove_region(&mut self, msg: RemoveRegion) -> Result<(), SessionError> {
        if let Some(frame) = self.frames.get_mut(&msg.file_id) {
            frame.remove_region(msg.region_id);
        }
        Ok(())
    }

    async fn on_set_cursor(&mut self, msg: SetCursor, request_id: u32) -> Result<(), SessionError> {
        let point = msg
            .point
            .ok_or_else(|| SessionError::InvalidRequest("missing cursor point".into()))?;
        let frame = self
            .frames
            .get_mut(&msg.file_id)
            .ok_or(SessionError::FileNotFound {
                file_id: msg.file_id,
            })?;
        frame.set_cursor(point.x as f64, point.y as f64);

        let cursor = frame.region_ref(CURSOR_REGION_ID);
        let has_spatial = cursor
            .map(|r| !r.profiler_ref().spatial_requests().is_empty())
            .unwrap_or(false);
        let has_spectral = cursor
            .map(|r| !r.profiler_ref().spectral_requests().is_empty())
            .unwrap_or(false);

        if has_spatial {
            self.send_spatial_profiles(msg.file_id, CURSOR_REGION_ID, request_id)
                .await?;
        }
        if has_spectral {
            self.send_spectral_profiles(msg.file_id, CURSOR_REGION_ID, request_id)
                .await?;
        }
        Ok(())
    }

    async fn on_set_histogram_requirements(
        &mut self,
        msg: SetHistogramRequirements,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let frame = self
            .frames
            .get_mut(&msg.file_id)
            .ok_or(SessionError::FileNotFound {
                file_id: msg.file_id,
            })?;
        let region = frame
            .region_mut(msg.region_id)
            .ok_or(FrameError::RegionNotFound {
                region_id: msg.region_id,
            })?;
        region.stats().set_histogram_configs(msg.histograms);
        self.send_region_histograms(msg.file_id, msg.region_id, request_id)
            .await
    }

    async fn on_set_spatial_requirements(
        &mut self,
        msg: SetSpatialRequirements,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let frame = self
            .frames
            .get_mut(&msg.file_id)
            .ok_or(SessionError::FileNotFound {
                file_id: msg.file_id,
            })?;
        let n_stokes = frame.shape().stokes;
        let default_stokes = frame.stokes();
        let region = frame
            .region_mut(msg.region_id)
            .ok_or(FrameError::RegionNotFound {
                region_id: msg.region_id,
            })?;
        let accepted_all = region.profiler().set_spatial_requirements(
            &msg.spatial_profiles,
            n_stokes,
            default_stokes,
        );
        if !accepted_all {
            debug!(
                session = %self.short_id,
                region_id = msg.region_id,
                "some spatial profile codes were dropped"
            );
        }

        if region.kind() == RegionType::Point && region.control_point(0).is_some() {
            self.send_spatial_profiles(msg.file_id, msg.region_id, request_id)
                .await?;
        }
        Ok(())
    }

    async fn on_set_spectral_requirements(
        &mut self,
        msg: SetSpectralRequirements,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let frame = self
            .frames
            .get_mut(&msg.file_id)
            .ok_or(SessionError::FileNotFound {
                file_id: msg.file_id,
            })?;
        let n_stokes = frame.shape().stokes;
        let default_stokes = frame.stokes();
        let region = frame
            .region_mut(msg.region_id)
            .ok_or(FrameError::RegionNotFound {
                region_id: msg.region_id,
            })?;
        region.profiler().set_spectral_requirements(
            &msg.spectral_profiles,
            n_stokes,
            default_stokes,
        );
        if !region.profiler_ref().spectral_requests().is_empty() {
            self.send_spectral_profiles(msg.file_id, msg.region_id, request_id)
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Responses
    // =========================================================================

    /// Build and send a raster for the frame's current view, always
    /// embedding the matching whole-image histogram.
    async fn send_raster(&mut self, file_id: i32, request_id: u32) -> Result<(), SessionError> {
        self.raster_seq += 1;
        let priority = self.raster_seq;
        let task = task_id(self.tag, file_id);

        let frame = self
            .frames
            .get_mut(&file_id)
            .ok_or(SessionError::FileNotFound { file_id })?;
        let histogram = frame.current_plane_histogram()?;
        let histogram_data = RegionHistogramData {
            file_id,
            region_id: WHOLE_IMAGE_REGION_ID,
            stokes: frame.stokes() as i32,
            histograms: vec![histogram],
        };

        let data = frame.get_image_data(true)?;
        let row_length = frame.row_length();
        let num_rows = frame.num_rows();
        let bounds = frame.bounds();
        let (channel, stokes, mip) = (
            frame.channel() as i32,
            frame.stokes() as i32,
            frame.mip() as i32,
        );

        let settings = self.compression;
        let (image_data, nan_encodings, quality) = match settings.kind {
            CompressionType::None => {
                let runs = codec::nan_encodings_block(&data, row_length, num_rows)?;
                (
                    vec![codec::raw_block(&data)],
                    vec![codec::runs_to_bytes(&runs)],
                    0.0,
                )
            }
            CompressionType::LossyFloat => {
                let precision = comp::clamp_precision(settings.quality);
                let bands = comp::compress_raster(
                    &self.pool,
                    task,
                    priority,
                    Arc::new(data),
                    row_length,
                    num_rows,
                    precision,
                    settings.num_subsets,
                )
                .await?;
                (
                    bands.blocks,
                    bands
                        .nan_encodings
                        .iter()
                        .map(|runs| codec::runs_to_bytes(runs))
                        .collect(),
                    precision as f32,
                )
            }
        };

        let raster = RasterImageData {
            file_id,
            channel,
            stokes,
            mip,
            image_bounds: Some(ImageBounds {
                x_min: bounds.x_min as i32,
                x_max: bounds.x_max as i32,
                y_min: bounds.y_min as i32,
                y_max: bounds.y_max as i32,
            }),
            compression_type: settings.kind as i32,
            compression_quality: quality,
            image_data,
            nan_encodings,
            channel_histogram_data: Some(histogram_data),
        };
        self.send_event(event::RASTER_IMAGE_DATA, request_id, &raster)
            .await
    }

    async fn send_region_histograms(
        &mut self,
        file_id: i32,
        region_id: i32,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let frame = self
            .frames
            .get_mut(&file_id)
            .ok_or(SessionError::FileNotFound { file_id })?;
        let mut data = frame.region_histogram_data(region_id).await?;
        data.file_id = file_id;
        self.send_event(event::REGION_HISTOGRAM_DATA, request_id, &data)
            .await
    }

    async fn send_spatial_profiles(
        &mut self,
        file_id: i32,
        region_id: i32,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let frame = self
            .frames
            .get_mut(&file_id)
            .ok_or(SessionError::FileNotFound { file_id })?;
        let mut data = frame.spatial_profile_data(region_id).await?;
        data.file_id = file_id;
        self.send_event(event::SPATIAL_PROFILE_DATA, request_id, &data)
            .await
    }

    async fn send_spectral_profiles(
        &mut self,
        file_id: i32,
        region_id: i32,
        request_id: u32,
    ) -> Result<(), SessionError> {
        let frame = self
            .frames
            .get_mut(&file_id)
            .ok_or(SessionError::FileNotFound { file_id })?;
        let mut data = frame.spectral_profile_data(region_id).await?;
        data.file_id = file_id;
        self.send_event(event::SPECTRAL_PROFILE_DATA, request_id, &data)
            .await
    }

    // =========================================================================
    // Outbound framing
    // =========================================================================

    async fn send_event(
        &mut self,
        name: &str,
        request_id: u32,
        payload: &impl Message,
    ) -> Result<(), SessionError> {
        let frame = proto::encode_frame(&mut self.send_buf, name, request_id, payload);
        self.outbound
            .send(frame)
            .await
            .map_err(|_| SessionError::Cancelled)
    }

    async fn send_error(
        &mut self,
        event_name: &str,
        request_id: u32,
        err: &SessionError,
    ) -> Result<(), SessionError> {
        let payload = ErrorData {
            message: err.to_string(),
            tags: vec![event_name.to_ascii_lowercase()],
            severity: ErrorSeverity::Error as i32,
        };
        self.send_event(event::ERROR_DATA, request_id, &payload).await
    }
}

fn browser_file_type(path: &std::path::Path) -> i32 {
    match detect_format(path) {
        crate::image::CubeFormat::Fits => FileType::Fits as i32,
        crate::image::CubeFormat::Hdf5 => FileType::Hdf5 as i32,
        crate::image::CubeFormat::Paged => FileType::Casa as i32,
        crate::image::CubeFormat::Miriad => FileType::Miriad as i32,
        crate::image::CubeFormat::Unknown => FileType::Unknown as i32,
    }
}
