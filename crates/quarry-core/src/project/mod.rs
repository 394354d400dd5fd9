//! Project descriptors and classpath assembly.

mod classpath;
mod descriptor;
mod runtime;

pub use classpath::{Classpath, ClasspathBuilder, DESCRIPTOR_FILE, LaunchSpec};
pub use descriptor::{ProjectDescriptor, ProjectDescriptorParser, ScopeFilter};
pub use runtime::{RuntimeProvider, SystemRuntimeProvider};
