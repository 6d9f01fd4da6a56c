//! Testing utilities for livecheck
//!
//! Synthetic faces and a scripted camera backend for offline testing and demos
//! without camera hardware.

pub mod synthetic_data;

pub use synthetic_data::{
    synthetic_empty_frame, synthetic_face_frame, FaceParams, FaceScript, SyntheticCamera,
    SyntheticFailure,
};
