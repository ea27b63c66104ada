pub mod artifact;
pub mod xgboost_booster;
