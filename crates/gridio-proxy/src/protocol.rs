//! Wire protocol between the proxy and its worker.
//!
//! One JSON object per line in each direction. Every [`RequestFrame`] carries
//! a sequence number that its [`ResponseFrame`] echoes. Floating point
//! values cross as IEEE-754 bit patterns so fill values and NaN survive
//! exactly.

use std::path::PathBuf;

use gridio_core::{
    ApiResult, Convention, CoordinateSystemRef, EdgeNodes, ErrorCode, FaceNodes, GlobalMetadata,
    LocationType, MeshGeometry, MeshId, OpenMode, VarId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serde adapters carrying `f64` values as their bit patterns.
pub mod bits {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// A single value.
    pub mod scalar {
        use super::*;

        /// Serialize `value` as `u64` bits.
        pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
            value.to_bits().serialize(s)
        }

        /// Deserialize `u64` bits.
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
            u64::deserialize(d).map(f64::from_bits)
        }
    }

    /// A vector of values.
    pub mod vec {
        use super::*;

        /// Serialize `values` as `u64` bits.
        pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
            s.collect_seq(values.iter().map(|v| v.to_bits()))
        }

        /// Deserialize `u64` bits.
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
            let raw = Vec::<u64>::deserialize(d)?;
            Ok(raw.into_iter().map(f64::from_bits).collect())
        }
    }
}

/// One mesh API call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Open a dataset.
    Open {
        /// Dataset path.
        path: PathBuf,
        /// Access mode.
        mode: OpenMode,
    },
    /// Create a dataset.
    CreateFile {
        /// Dataset path.
        path: PathBuf,
        /// Global attributes to write.
        metadata: GlobalMetadata,
    },
    /// Close the open dataset.
    Close,
    /// Convention of a file or of the open dataset.
    Convention {
        /// File to inspect; the open dataset when absent.
        path: Option<PathBuf>,
    },
    /// Convention version of the open dataset.
    Version,
    /// Fill value of the last bed level read.
    ZFillValue,
    /// Number of meshes.
    MeshCount,
    /// Name of a mesh.
    MeshName {
        /// Mesh.
        mesh: MeshId,
    },
    /// Number of nodes.
    NodeCount {
        /// Mesh.
        mesh: MeshId,
    },
    /// Number of edges.
    EdgeCount {
        /// Mesh.
        mesh: MeshId,
    },
    /// Number of faces.
    FaceCount {
        /// Mesh.
        mesh: MeshId,
    },
    /// Widest face.
    MaxFaceNodes {
        /// Mesh.
        mesh: MeshId,
    },
    /// Stored EPSG code.
    CoordinateSystemCode,
    /// Node x coordinates.
    NodeX {
        /// Mesh.
        mesh: MeshId,
    },
    /// Node y coordinates.
    NodeY {
        /// Mesh.
        mesh: MeshId,
    },
    /// Node bed levels.
    NodeZ {
        /// Mesh.
        mesh: MeshId,
    },
    /// Edge connectivity.
    EdgeNodes {
        /// Mesh.
        mesh: MeshId,
    },
    /// Face connectivity.
    FaceNodes {
        /// Mesh.
        mesh: MeshId,
    },
    /// Number of data variables at a location.
    VarCount {
        /// Mesh.
        mesh: MeshId,
        /// Location.
        location: LocationType,
    },
    /// Ids of data variables at a location.
    VarIds {
        /// Mesh.
        mesh: MeshId,
        /// Location.
        location: LocationType,
    },
    /// Overwrite node coordinates.
    WriteXyCoordinates {
        /// Mesh.
        mesh: MeshId,
        /// X values.
        #[serde(with = "bits::vec")]
        xs: Vec<f64>,
        /// Y values.
        #[serde(with = "bits::vec")]
        ys: Vec<f64>,
    },
    /// Write bed levels.
    WriteZValues {
        /// Mesh.
        mesh: MeshId,
        /// Location.
        location: LocationType,
        /// Variable name.
        var_name: String,
        /// `long_name` for a newly defined variable.
        long_name: String,
        /// Values.
        #[serde(with = "bits::vec")]
        values: Vec<f64>,
    },
    /// Read bed levels.
    ReadZValues {
        /// Mesh.
        mesh: MeshId,
        /// Location.
        location: LocationType,
        /// Variable name.
        var_name: String,
    },
    /// Define a mesh.
    DefineMesh {
        /// Mesh definition.
        geometry: MeshGeometry,
    },
    /// Store a coordinate system.
    WriteCoordinateSystem {
        /// Coordinate system.
        crs: CoordinateSystemRef,
    },
    /// Close the dataset and exit.
    Shutdown,
}

impl Request {
    /// Operation name, as used in logs and fault injection.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::CreateFile { .. } => "create_file",
            Self::Close => "close",
            Self::Convention { .. } => "convention",
            Self::Version => "version",
            Self::ZFillValue => "z_fill_value",
            Self::MeshCount => "mesh_count",
            Self::MeshName { .. } => "mesh_name",
            Self::NodeCount { .. } => "node_count",
            Self::EdgeCount { .. } => "edge_count",
            Self::FaceCount { .. } => "face_count",
            Self::MaxFaceNodes { .. } => "max_face_nodes",
            Self::CoordinateSystemCode => "coordinate_system_code",
            Self::NodeX { .. } => "node_x",
            Self::NodeY { .. } => "node_y",
            Self::NodeZ { .. } => "node_z",
            Self::EdgeNodes { .. } => "edge_nodes",
            Self::FaceNodes { .. } => "face_nodes",
            Self::VarCount { .. } => "var_count",
            Self::VarIds { .. } => "var_ids",
            Self::WriteXyCoordinates { .. } => "write_xy_coordinates",
            Self::WriteZValues { .. } => "write_z_values",
            Self::ReadZValues { .. } => "read_z_values",
            Self::DefineMesh { .. } => "define_mesh",
            Self::WriteCoordinateSystem { .. } => "write_coordinate_system",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Successful result of one call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    /// No payload.
    Unit,
    /// A count.
    Count(usize),
    /// A name.
    Name(String),
    /// An integer code.
    Code(i32),
    /// A convention.
    Convention(Convention),
    /// A mesh id.
    Mesh(MeshId),
    /// A floating point value.
    Float(#[serde(with = "bits::scalar")] f64),
    /// Floating point values.
    Values(#[serde(with = "bits::vec")] Vec<f64>),
    /// Edge connectivity.
    Edges(EdgeNodes),
    /// Face connectivity, flat row-major.
    Faces {
        /// Number of faces.
        rows: usize,
        /// Entries per row.
        max_width: usize,
        /// Padding sentinel.
        fill_value: i32,
        /// Row-major ids.
        data: Vec<i32>,
    },
    /// Variable ids.
    VarIds(Vec<VarId>),
}

impl Reply {
    /// Wrap face connectivity.
    pub fn faces(faces: &FaceNodes) -> Self {
        Self::Faces {
            rows: faces.rows(),
            max_width: faces.max_width(),
            fill_value: faces.fill_value(),
            data: faces.as_flat().to_vec(),
        }
    }

    fn mismatch<T>(self, expected: &str) -> ApiResult<T> {
        log::error!("worker replied {self:?} where {expected} was expected");
        Err(ErrorCode::GENERAL_FATAL_ERR)
    }

    /// Expect [`Reply::Unit`].
    pub fn into_unit(self) -> ApiResult<()> {
        match self {
            Self::Unit => Ok(()),
            other => other.mismatch("unit"),
        }
    }

    /// Expect [`Reply::Count`].
    pub fn into_count(self) -> ApiResult<usize> {
        match self {
            Self::Count(n) => Ok(n),
            other => other.mismatch("a count"),
        }
    }

    /// Expect [`Reply::Name`].
    pub fn into_name(self) -> ApiResult<String> {
        match self {
            Self::Name(name) => Ok(name),
            other => other.mismatch("a name"),
        }
    }

    /// Expect [`Reply::Code`].
    pub fn into_code(self) -> ApiResult<i32> {
        match self {
            Self::Code(code) => Ok(code),
            other => other.mismatch("a code"),
        }
    }

    /// Expect [`Reply::Convention`].
    pub fn into_convention(self) -> ApiResult<Convention> {
        match self {
            Self::Convention(convention) => Ok(convention),
            other => other.mismatch("a convention"),
        }
    }

    /// Expect [`Reply::Mesh`].
    pub fn into_mesh(self) -> ApiResult<MeshId> {
        match self {
            Self::Mesh(mesh) => Ok(mesh),
            other => other.mismatch("a mesh id"),
        }
    }

    /// Expect [`Reply::Float`].
    pub fn into_float(self) -> ApiResult<f64> {
        match self {
            Self::Float(value) => Ok(value),
            other => other.mismatch("a float"),
        }
    }

    /// Expect [`Reply::Values`].
    pub fn into_values(self) -> ApiResult<Vec<f64>> {
        match self {
            Self::Values(values) => Ok(values),
            other => other.mismatch("values"),
        }
    }

    /// Expect [`Reply::Edges`].
    pub fn into_edges(self) -> ApiResult<EdgeNodes> {
        match self {
            Self::Edges(edges) => Ok(edges),
            other => other.mismatch("edge nodes"),
        }
    }

    /// Expect [`Reply::Faces`], checking the shape.
    pub fn into_faces(self) -> ApiResult<FaceNodes> {
        match self {
            Self::Faces {
                rows,
                max_width,
                fill_value,
                data,
            } => FaceNodes::from_flat(rows, max_width, fill_value, data).map_err(|e| {
                log::error!("worker sent malformed face nodes: {e}");
                ErrorCode::GENERAL_FATAL_ERR
            }),
            other => other.mismatch("face nodes"),
        }
    }

    /// Expect [`Reply::VarIds`].
    pub fn into_var_ids(self) -> ApiResult<Vec<VarId>> {
        match self {
            Self::VarIds(ids) => Ok(ids),
            other => other.mismatch("variable ids"),
        }
    }
}

/// A request with its sequence number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Sequence number echoed by the response.
    pub seq: u64,
    /// The call.
    pub request: Request,
}

/// The outcome of one request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Sequence number of the request.
    pub seq: u64,
    /// Result of the call.
    pub result: Result<Reply, ErrorCode>,
}

/// Failure to decode a protocol line.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The line is not a valid frame.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The response answers a different request.
    #[error("response {got} does not answer request {expected}")]
    SequenceMismatch {
        /// Sequence number sent.
        expected: u64,
        /// Sequence number received.
        got: u64,
    },
}

/// Encode a frame as one line, newline excluded.
pub fn encode<T: Serialize>(frame: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode a request line.
pub fn decode_request(line: &str) -> Result<RequestFrame, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Decode a response line and check it answers request `expected`.
pub fn decode_response(line: &str, expected: u64) -> Result<ResponseFrame, ProtocolError> {
    let frame: ResponseFrame = serde_json::from_str(line)?;
    if frame.seq != expected {
        return Err(ProtocolError::SequenceMismatch {
            expected,
            got: frame.seq,
        });
    }
    Ok(frame)
}
