//! Backend-agnostic conformance checks for portable depth-to-space programs.
//!
//! Each check is a plain function generic over [`d2s::PortableBackend`]. Backend crates
//! instantiate the whole suite with [`define_backend_tests!`].

pub mod conformance;
pub mod harness;
pub mod smoke;

#[macro_export]
macro_rules! define_backend_tests {
    ($module:ident, $backend_ctor:expr) => {
        #[cfg(test)]
        mod $module {
            use std::sync::Arc;

            use super::*;
            use $crate::{conformance, smoke};

            macro_rules! backend_test {
                ($name:ident, $func:path) => {
                    #[test]
                    fn $name() {
                        let backend = ($backend_ctor)();
                        $func(&backend);
                    }
                };
            }

            backend_test!(smoke_backend_reports_name, smoke::backend_reports_name);
            backend_test!(smoke_fixture_crd_layout, smoke::fixture_crd_layout);
            backend_test!(smoke_fixture_dcr_layout, smoke::fixture_dcr_layout);

            backend_test!(
                graph_matches_eager_for_both_modes,
                conformance::graph_matches_eager_for_both_modes
            );
            backend_test!(
                decomposed_program_matches_eager,
                conformance::decomposed_program_matches_eager
            );
            backend_test!(
                crd_graph_matches_pixel_shuffle,
                conformance::crd_graph_matches_pixel_shuffle
            );
            backend_test!(
                integer_tensors_survive_graph,
                conformance::integer_tensors_survive_graph
            );
            backend_test!(
                serialized_program_runs_identically,
                conformance::serialized_program_runs_identically
            );
            backend_test!(
                dynamic_batch_program_accepts_any_batch,
                conformance::dynamic_batch_program_accepts_any_batch
            );
            backend_test!(
                dynamic_dims_cannot_be_materialized,
                conformance::dynamic_dims_cannot_be_materialized
            );
            backend_test!(
                entry_shape_mismatch_is_rejected,
                conformance::entry_shape_mismatch_is_rejected
            );
            backend_test!(
                invalid_attributes_are_rejected,
                conformance::invalid_attributes_are_rejected
            );
        }
    };
}
