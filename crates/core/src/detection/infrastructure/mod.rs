pub mod execution_provider;
pub mod image_tensor;
pub mod model_resolver;
pub mod onnx_blazeface_detector;
pub mod onnx_face_mesh;
