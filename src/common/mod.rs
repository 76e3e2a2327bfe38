pub mod k8s_names;

pub use k8s_names::{managed_by_labels, selector_labels, standard_labels, to_k8s_name};
