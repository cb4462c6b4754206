//! Protocol message definitions.
//!
//! Hand-written `prost` structs for every event payload; the field tags are
//! the wire contract. Enum-typed fields are carried as `i32` and decoded
//! through the generated `try_from`, so unknown values survive a round
//! trip without panicking.

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CompressionType {
    None = 0,
    /// Lossy floating-point block codec with an integer precision knob
    LossyFloat = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorSeverity {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Critical = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RegionType {
    WholeImage = 0,
    Point = 1,
    Rectangle = 2,
    Polygon = 3,
    Ellipse = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum StatsType {
    Sum = 0,
    Flux = 1,
    Mean = 2,
    Rms = 3,
    Sigma = 4,
    SumSq = 5,
    Min = 6,
    Max = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FileType {
    Unknown = 0,
    Fits = 1,
    Hdf5 = 2,
    Casa = 3,
    Miriad = 4,
}

// =============================================================================
// Shared sub-messages
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Point {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct ImageBounds {
    #[prost(int32, tag = "1")]
    pub x_min: i32,
    #[prost(int32, tag = "2")]
    pub x_max: i32,
    #[prost(int32, tag = "3")]
    pub y_min: i32,
    #[prost(int32, tag = "4")]
    pub y_max: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Histogram {
    #[prost(int32, tag = "1")]
    pub channel: i32,
    #[prost(int32, tag = "2")]
    pub num_bins: i32,
    #[prost(float, tag = "3")]
    pub bin_width: f32,
    #[prost(float, tag = "4")]
    pub first_bin_center: f32,
    #[prost(int64, repeated, tag = "5")]
    pub bins: Vec<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HistogramConfig {
    /// -1 = current channel, -2 = every channel
    #[prost(int32, tag = "1")]
    pub channel: i32,
    /// -1 = automatic bin count
    #[prost(int32, tag = "2")]
    pub num_bins: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(enumeration = "FileType", tag = "2")]
    pub r#type: i32,
    #[prost(int64, tag = "3")]
    pub size: i64,
    #[prost(string, repeated, tag = "4")]
    pub hdu_list: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileInfoExtended {
    #[prost(int32, tag = "1")]
    pub dimensions: i32,
    #[prost(int32, tag = "2")]
    pub width: i32,
    #[prost(int32, tag = "3")]
    pub height: i32,
    #[prost(int32, tag = "4")]
    pub depth: i32,
    #[prost(int32, tag = "5")]
    pub stokes: i32,
}

// =============================================================================
// Registration
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterViewer {
    #[prost(string, tag = "1")]
    pub api_key: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterViewerAck {
    #[prost(string, tag = "1")]
    pub session_id: String,
    #[prost(bool, tag = "2")]
    pub success: bool,
}

// =============================================================================
// File browsing
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileListRequest {
    #[prost(string, tag = "1")]
    pub directory: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileListResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(string, tag = "3")]
    pub directory: String,
    #[prost(string, tag = "4")]
    pub parent: String,
    #[prost(message, repeated, tag = "5")]
    pub files: Vec<FileInfo>,
    #[prost(string, repeated, tag = "6")]
    pub subdirectories: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileInfoRequest {
    #[prost(string, tag = "1")]
    pub directory: String,
    #[prost(string, tag = "2")]
    pub file: String,
    #[prost(string, tag = "3")]
    pub hdu: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileInfoResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, optional, tag = "3")]
    pub file_info: Option<FileInfo>,
}

// =============================================================================
// Opening and closing images
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OpenFile {
    #[prost(string, tag = "1")]
    pub directory: String,
    #[prost(string, tag = "2")]
    pub file: String,
    #[prost(string, tag = "3")]
    pub hdu: String,
    #[prost(int32, tag = "4")]
    pub file_id: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OpenFileAck {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(message, optional, tag = "4")]
    pub file_info: Option<FileInfo>,
    #[prost(message, optional, tag = "5")]
    pub file_info_extended: Option<FileInfoExtended>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CloseFile {
    /// -1 closes every open file
    #[prost(int32, tag = "1")]
    pub file_id: i32,
}

// =============================================================================
// View state
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetImageView {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(message, optional, tag = "2")]
    pub image_bounds: Option<ImageBounds>,
    #[prost(int32, tag = "3")]
    pub mip: i32,
    #[prost(enumeration = "CompressionType", tag = "4")]
    pub compression_type: i32,
    #[prost(float, tag = "5")]
    pub compression_quality: f32,
    #[prost(int32, tag = "6")]
    pub num_subsets: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetImageChannels {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub channel: i32,
    #[prost(int32, tag = "3")]
    pub stokes: i32,
}

// =============================================================================
// Regions
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetRegion {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(string, tag = "3")]
    pub region_name: String,
    #[prost(enumeration = "RegionType", tag = "4")]
    pub region_type: i32,
    #[prost(int32, tag = "5")]
    pub channel_min: i32,
    #[prost(int32, tag = "6")]
    pub channel_max: i32,
    #[prost(int32, repeated, tag = "7")]
    pub stokes: Vec<i32>,
    #[prost(message, repeated, tag = "8")]
    pub control_points: Vec<Point>,
    #[prost(float, tag = "9")]
    pub rotation: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetRegionAck {
    #[prost(int32, tag = "1")]
    pub region_id: i32,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoveRegion {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetCursor {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(message, optional, tag = "2")]
    pub point: Option<Point>,
}

// =============================================================================
// Requirements
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetHistogramRequirements {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(message, repeated, tag = "3")]
    pub histograms: Vec<HistogramConfig>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetSpatialRequirements {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    /// Coordinate codes such as "x", "y", "Qx"
    #[prost(string, repeated, tag = "3")]
    pub spatial_profiles: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpectralConfig {
    /// Coordinate code such as "z" or "Iz"
    #[prost(string, tag = "1")]
    pub coordinate: String,
    #[prost(enumeration = "StatsType", repeated, tag = "2")]
    pub stats_types: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetSpectralRequirements {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(message, repeated, tag = "3")]
    pub spectral_profiles: Vec<SpectralConfig>,
}

// =============================================================================
// Data responses
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegionHistogramData {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(int32, tag = "3")]
    pub stokes: i32,
    #[prost(message, repeated, tag = "4")]
    pub histograms: Vec<Histogram>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RasterImageData {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub channel: i32,
    #[prost(int32, tag = "3")]
    pub stokes: i32,
    #[prost(int32, tag = "4")]
    pub mip: i32,
    #[prost(message, optional, tag = "5")]
    pub image_bounds: Option<ImageBounds>,
    #[prost(enumeration = "CompressionType", tag = "6")]
    pub compression_type: i32,
    #[prost(float, tag = "7")]
    pub compression_quality: f32,
    /// One compressed block per band, in band order
    #[prost(bytes = "vec", repeated, tag = "8")]
    pub image_data: Vec<Vec<u8>>,
    /// One run-length NaN map per band, little-endian i32 runs
    #[prost(bytes = "vec", repeated, tag = "9")]
    pub nan_encodings: Vec<Vec<u8>>,
    #[prost(message, optional, tag = "10")]
    pub channel_histogram_data: Option<RegionHistogramData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpatialProfile {
    #[prost(string, tag = "1")]
    pub coordinate: String,
    #[prost(int32, tag = "2")]
    pub start: i32,
    #[prost(int32, tag = "3")]
    pub end: i32,
    #[prost(float, repeated, tag = "4")]
    pub values: Vec<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpatialProfileData {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(int32, tag = "3")]
    pub x: i32,
    #[prost(int32, tag = "4")]
    pub y: i32,
    #[prost(int32, tag = "5")]
    pub channel: i32,
    #[prost(int32, tag = "6")]
    pub stokes: i32,
    /// Pixel value under the cursor
    #[prost(float, tag = "7")]
    pub value: f32,
    #[prost(message, repeated, tag = "8")]
    pub profiles: Vec<SpatialProfile>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpectralProfile {
    #[prost(string, tag = "1")]
    pub coordinate: String,
    #[prost(enumeration = "StatsType", tag = "2")]
    pub stats_type: i32,
    #[prost(float, repeated, tag = "3")]
    pub values: Vec<f32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpectralProfileData {
    #[prost(int32, tag = "1")]
    pub file_id: i32,
    #[prost(int32, tag = "2")]
    pub region_id: i32,
    #[prost(int32, tag = "3")]
    pub stokes: i32,
    #[prost(message, repeated, tag = "4")]
    pub profiles: Vec<SpectralProfile>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorData {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(string, repeated, tag = "2")]
    pub tags: Vec<String>,
    #[prost(enumeration = "ErrorSeverity", tag = "3")]
    pub severity: i32,
}

// =============================================================================
// Tests
// =============================================================================
