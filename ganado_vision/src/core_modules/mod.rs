pub mod pixel;
pub mod roi;
pub mod luma;
pub mod feature_extractor;
pub mod component;
pub mod region_segmenter;
pub mod lesion_classifier;
pub mod rubric_scorer;
pub mod aggregator;
pub mod ensemble;
pub mod variants;
pub mod zebu;
