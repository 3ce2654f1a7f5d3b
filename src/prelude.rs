//! Traits needed to call driver methods, imported anonymously
pub use crate::controller::Controller as _;
pub use cantrx_core::RegisterAccess as _;
pub use cantrx_core::WaitPolicy as _;
pub use embedded_can::nb::Can as _;
pub use embedded_can::Frame as _;
