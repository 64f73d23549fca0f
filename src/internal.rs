mod listener;
mod registry;

pub(crate) use listener::Listener;
pub(crate) use registry::Registry;
