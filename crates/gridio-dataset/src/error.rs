//! Errors raised by [`MeshDataset`](crate::MeshDataset) operations.

use std::fmt;
use std::path::PathBuf;

use gridio_core::ErrorCode;
use thiserror::Error;

/// The dataset operation that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Reading the convention of a dataset or file.
    Convention,
    /// Reading the stored coordinate system.
    CoordinateSystem,
    /// Counting 2D meshes.
    MeshCount,
    /// Counting nodes.
    NodeCount,
    /// Counting edges.
    EdgeCount,
    /// Counting faces.
    FaceCount,
    /// Reading the widest face.
    MaxFaceNodes,
    /// Reading node x coordinates.
    NodeX,
    /// Reading node y coordinates.
    NodeY,
    /// Reading node bed levels.
    NodeZ,
    /// Reading edge connectivity.
    EdgeNodes,
    /// Reading face connectivity.
    FaceNodes,
    /// Counting variables at a location.
    NameCount,
    /// Listing variables at a location.
    Names,
    /// Overwriting node coordinates.
    RewriteCoordinates,
    /// Writing bed levels at nodes.
    WriteNodeZ,
    /// Writing bed levels at faces.
    WriteFaceZ,
    /// Reading bed levels at nodes.
    ReadNodeZ,
    /// Reading bed levels at faces.
    ReadFaceZ,
    /// Reading a mesh name.
    MeshName,
    /// Defining a mesh.
    DefineMesh,
    /// Writing the coordinate system.
    WriteCoordinateSystem,
}

impl Operation {
    /// Human-readable failure message.
    pub fn message(self) -> &'static str {
        match self {
            Self::Convention => "Couldn't get the grid convention",
            Self::CoordinateSystem => "Couldn't get the coordinate system",
            Self::MeshCount => "Couldn't get the number of 2D meshes",
            Self::NodeCount => "Couldn't get the number of nodes",
            Self::EdgeCount => "Couldn't get number of edges",
            Self::FaceCount => "Couldn't get number of faces",
            Self::MaxFaceNodes => "Couldn't get max face nodes",
            Self::NodeX => "Couldn't get x node coordinates",
            Self::NodeY => "Couldn't get y node coordinates",
            Self::NodeZ => "Couldn't get z node coordinates",
            Self::EdgeNodes => "Couldn't get edge nodes of the mesh",
            Self::FaceNodes => "Couldn't get face nodes of the mesh",
            Self::NameCount => "Couldn't get the number of names for location type",
            Self::Names => "Couldn't get the names at location",
            Self::RewriteCoordinates => "Couldn't rewrite grid coordinates",
            Self::WriteNodeZ => "Error writing z values at mesh nodes",
            Self::WriteFaceZ => "Error writing z values at mesh faces",
            Self::ReadNodeZ => "Error reading z values at mesh nodes",
            Self::ReadFaceZ => "Error reading z values at mesh faces",
            Self::MeshName => "Couldn't get meshname",
            Self::DefineMesh => "Couldn't define mesh",
            Self::WriteCoordinateSystem => "Couldn't write coordinate system",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A failed dataset operation.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset could not be opened or created.
    #[error("Couldn't open mesh file: {}: {code}", path.display())]
    Open {
        /// File that failed to open.
        path: PathBuf,
        /// Status returned by the mesh API.
        code: ErrorCode,
    },
    /// A mesh API call returned an error status.
    #[error("{operation}: {code}")]
    Api {
        /// What was being done.
        operation: Operation,
        /// Status returned by the mesh API.
        code: ErrorCode,
    },
    /// The dataset was disposed, or failed to open earlier.
    #[error("mesh dataset {} has been disposed", path.display())]
    Disposed {
        /// File the dataset was bound to.
        path: PathBuf,
    },
}

impl DatasetError {
    /// Status code behind the failure, if the mesh API reported one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Open { code, .. } | Self::Api { code, .. } => Some(*code),
            Self::Disposed { .. } => None,
        }
    }

    /// The failed operation, for API errors.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Api { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

/// Attach an [`Operation`] to a mesh API status.
pub(crate) trait OperationContext<T> {
    fn during(self, operation: Operation) -> Result<T, DatasetError>;
}

impl<T> OperationContext<T> for Result<T, ErrorCode> {
    fn during(self, operation: Operation) -> Result<T, DatasetError> {
        self.map_err(|code| DatasetError::Api { operation, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_embeds_operation_and_code() {
        let err = DatasetError::Api {
            operation: Operation::EdgeCount,
            code: ErrorCode::IONC_EBADMESH,
        };
        let text = err.to_string();
        assert!(text.starts_with("Couldn't get number of edges"), "{text}");
        assert!(text.contains("-2010"), "{text}");
        assert_eq!(err.code(), Some(ErrorCode::IONC_EBADMESH));
        assert_eq!(err.operation(), Some(Operation::EdgeCount));
    }

    #[test]
    fn open_error_names_the_file() {
        let err = DatasetError::Open {
            path: PathBuf::from("/data/missing_net.nc"),
            code: ErrorCode::GENERAL_FATAL_ERR,
        };
        let text = err.to_string();
        assert!(text.starts_with("Couldn't open mesh file: /data/missing_net.nc"));
        assert!(text.contains("-1000"), "{text}");
        assert_eq!(err.operation(), None);
    }

    #[test]
    fn context_maps_only_errors() {
        let ok: Result<u8, ErrorCode> = Ok(3);
        assert_eq!(ok.during(Operation::MeshCount).unwrap(), 3);
        let err: Result<u8, ErrorCode> = Err(ErrorCode::IONC_ENOTVAR);
        assert_eq!(
            err.during(Operation::ReadFaceZ).unwrap_err().operation(),
            Some(Operation::ReadFaceZ)
        );
    }
}
