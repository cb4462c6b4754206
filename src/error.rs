use thiserror::Error;

/// Errors raised by image sources while opening or slicing a cube.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Underlying storage could not be reached or read
    #[error("I/O error reading image: {0}")]
    Io(#[from] std::io::Error),

    /// The container metadata is corrupt or unsupported
    #[error("Format error: {0}")]
    Format(String),

    /// The image is not 2D, 3D or 4D
    #[error("Image must be 2D, 3D or 4D, got {ndims} dimensions")]
    Dimension { ndims: usize },

    /// Requested slice lies outside the image
    #[error("Slice out of bounds: channel {channel}, stokes {stokes}")]
    SliceOutOfBounds { channel: usize, stokes: usize },

    /// A statistics sub-dataset was requested without checking `has_sub`
    #[error("Statistics table not present: {0}")]
    MissingStats(&'static str),
}

/// Errors raised by the lossy block codec and the NaN encoder.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Precision outside the supported range
    #[error("Invalid precision: {precision}")]
    InvalidPrecision { precision: u32 },

    /// Compressed block could not be decoded
    #[error("Block decode failed: {0}")]
    Decode(String),

    /// Band shape does not match the supplied data
    #[error("Band shape mismatch: {rows} rows of {row_length} != {len} values")]
    ShapeMismatch {
        rows: usize,
        row_length: usize,
        len: usize,
    },
}

/// Errors raised by `Frame` state transitions and data requests.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Channel index outside [0, depth)
    #[error("Channel {channel} is invalid: image has {depth} channels")]
    InvalidChannel { channel: i32, depth: usize },

    /// Stokes index outside [0, stokes)
    #[error("Stokes {stokes} is invalid: image has {n_stokes} stokes planes")]
    InvalidStokes { stokes: i32, n_stokes: usize },

    /// View bounds extend past the image edge
    #[error("Bounds ({x_min},{y_min})-({x_max},{y_max}) outside {width}x{height} image")]
    BoundsOutOfImage {
        x_min: i32,
        y_min: i32,
        x_max: i32,
        y_max: i32,
        width: usize,
        height: usize,
    },

    /// Mip factor outside [1, min(width, height)]
    #[error("Mip {mip} is invalid for {width}x{height} image")]
    InvalidMip {
        mip: i32,
        width: usize,
        height: usize,
    },

    /// No region registered under this id
    #[error("Region {region_id} not found")]
    RegionNotFound { region_id: i32 },

    /// The slice cache is empty when a raster or histogram was requested
    #[error("No plane loaded")]
    NoPlane,

    /// Invariant violation: the cached plane disagrees with the image shape
    #[error("Slice cache is {rows}x{cols} but image is {width}x{height}")]
    CorruptSliceCache {
        rows: usize,
        cols: usize,
        width: usize,
        height: usize,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Errors surfaced by the session dispatcher.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed frame, unknown event or out-of-range fields
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown file id
    #[error("File {file_id} is not open")]
    FileNotFound { file_id: i32 },

    /// Access policy rejected the path
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Task superseded or session torn down; never reported to the client
    #[error("Cancelled")]
    Cancelled,

    /// Invariant violation; the session is terminated
    #[error("Fatal: {0}")]
    Fatal(String),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl SessionError {
    /// True for errors that close the connection instead of producing
    /// an `ERROR_DATA` event.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Fatal(_) | SessionError::Frame(FrameError::CorruptSliceCache { .. })
        )
    }
}
