/// two-point boundary value problems by MIRK collocation with residual control
pub mod BVP_collocation;
