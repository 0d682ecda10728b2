//! Reference CPU backend: interprets portable programs one instruction at a time on host
//! buffers. Favours obviously-correct index arithmetic over speed.

pub mod cpu;

pub use cpu::{
    CpuKernelInterceptor, CpuPortableBackend, CpuTensor, GenericCpuBackend, NoopInterceptor,
    TensorData,
};
