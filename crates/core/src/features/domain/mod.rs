pub mod aggregate_vector;
pub mod asymmetry_index;
pub mod asymmetry_tracker;
pub mod feature_matrix;
pub mod statistics;
