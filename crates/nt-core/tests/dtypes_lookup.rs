use nt_core::{DeviceType, NtError, ScalarType};

#[test]
fn names_round_trip_through_from_str() {
    for ty in [
        ScalarType::Int,
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::ComplexFloat,
        ScalarType::ComplexDouble,
    ] {
        let parsed: ScalarType = ty.name().parse().expect("known name");
        assert_eq!(parsed, ty);
    }
    assert_eq!("CPU".parse::<DeviceType>().expect("cpu"), DeviceType::Cpu);
    assert_eq!("cuda".parse::<DeviceType>().expect("gpu"), DeviceType::Gpu);
    assert_eq!("complex128".parse::<ScalarType>().expect("alias"), ScalarType::ComplexDouble);
}

#[test]
fn unknown_names_are_config_errors() {
    let err = "quaternion".parse::<ScalarType>().unwrap_err();
    assert!(matches!(err, NtError::Config(_)));
    assert_eq!(err.info().code, "unknown-scalar-type");
    let err = "tpu".parse::<DeviceType>().unwrap_err();
    assert_eq!(err.info().code, "unknown-device");
}

#[test]
fn promotion_follows_precision_and_complexity() {
    use ScalarType::*;
    assert_eq!(Int.promote(Float), Float);
    assert_eq!(Float.promote(Double), Double);
    assert_eq!(Float.promote(ComplexFloat), ComplexFloat);
    assert_eq!(Double.promote(ComplexFloat), ComplexDouble);
    assert_eq!(Int.promote(ComplexFloat), ComplexFloat);
    assert_eq!(ComplexDouble.to_real(), Double);
    assert_eq!(Int.to_complex(), ComplexFloat);
    assert_eq!(Int.to_floating(), Float);
    assert!(!Double.is_complex());
}

#[test]
fn only_cpu_is_available() {
    assert!(DeviceType::Cpu.is_available());
    assert!(!DeviceType::Gpu.is_available());
}
