pub mod newtons_method;
pub mod newtons_method_core;
