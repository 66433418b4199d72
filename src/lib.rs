//! # MPR viewer library
//!
//! This crate coordinates a multiplanar reconstruction (MPR) viewer: one CT
//! volume shown in three orthogonal viewports.
//!
//! Rendering, camera math, image loading and tool input all belong to a back
//! end reached through the traits in [`backend`]. The crate itself covers:
//!  - the initialization chain and its teardown ([`ViewerSession`])
//!  - a UI-side mirror of each viewport's slice and camera state
//!    ([`ViewportStateMirror`])
//!  - switching between crosshairs and length measurement on the primary
//!    mouse button ([`ToolActivationController`])
//!  - declarative configuration of ids, VOI window and annotation styles
//!    ([`ViewerConfig`])
//!
//! A CPU back end lives in [`headless`]. It loads DICOM files into a volume,
//! using rayon where the environment supports it, and renders slabs of the
//! three axes:
//!  - Axial
//!  - Coronal
//!  - Sagittal
//!
//!  Slabs are combined by maximum, minimum or mean intensity and windowed into
//!  gray images. DICOM files are assumed to have the following attributes:
//!   - Axial data set
//!   - No multiframe (always the first frame is used)
//!   - Images from the same series and acquisition
//!
//! Everything is single-threaded. Back-end handles are `Rc` and async steps
//! return local futures, so any current-thread executor can drive a session.
//!
//! # Examples
//!
//! ## Showing a directory of DICOM files
//!
//! Load every `.dcm` file from the dicom/ directory, initialize the viewer
//! and move the axial viewport to slice 42.
//!
//! ```no_run
//! # use std::rc::Rc;
//! # use mpr_viewer::{DICOM_FILE_SCHEME, HeadlessBackend, ImageId, ViewerConfig, ViewerError};
//! # use mpr_viewer::{ViewerSession, ViewportId, VolumeLoader};
//! # async fn run() -> Result<(), ViewerError> {
//! let image_ids = VolumeLoader::dicom_paths_in_directory("dicom")?
//!     .iter()
//!     .map(|path| ImageId::from_path(DICOM_FILE_SCHEME, path))
//!     .collect();
//! let backend = Rc::new(HeadlessBackend::new());
//! let session = ViewerSession::new(backend, ViewerConfig::default(), image_ids);
//! session.init().await?;
//!
//! session.scroll_to_slice(ViewportId::Axial, 42);
//! println!("{}", session.slice_label(ViewportId::Axial));
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod enums;
pub mod error;
pub mod headless;
pub mod ids;
mod interpolator;
pub mod mirror;
pub mod notifications;
pub mod presentation;
pub mod session;
pub mod tools;
pub mod volume;
pub mod volume_loader;

pub use config::ViewerConfig;
pub use enums::{PrimaryTool, ViewportId};
pub use error::{BackendError, ViewerError};
pub use headless::{DICOM_FILE_SCHEME, HeadlessBackend};
pub use ids::{ImageId, VolumeId};
pub use mirror::{ViewportSnapshot, ViewportStateMirror};
pub use session::ViewerSession;
pub use tools::ToolActivationController;
pub use volume_loader::VolumeLoader;
