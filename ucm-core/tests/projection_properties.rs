use nalgebra::{Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ucm_core::camera::validity::MIN_DEPTH;
use ucm_core::{
    CameraModel, EquidistantDistortion, ImageSize, JacobianRequest, LensDistortion,
    ProjectionResult, RadTanDistortion, UnifiedIntrinsics, UnifiedProjectionCamera,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn test_cameras() -> Vec<UnifiedProjectionCamera> {
    vec![
        UnifiedProjectionCamera::test_camera(),
        UnifiedProjectionCamera::test_camera_with_distortion(LensDistortion::new(
            RadTanDistortion::test_distortion(),
        )),
        UnifiedProjectionCamera::test_camera_with_distortion(LensDistortion::new(
            EquidistantDistortion::test_distortion(),
        )),
    ]
}

#[test]
fn visible_projections_round_trip() {
    let mut rng = StdRng::seed_from_u64(42);
    for camera in test_cameras() {
        let mut checked = 0;
        for _ in 0..500 {
            let p = Vector3::new(
                rng.random_range(-3.0..3.0),
                rng.random_range(-3.0..3.0),
                rng.random_range(-1.0..5.0),
            );
            let (kp, result) = camera.project3(&p);
            if result != ProjectionResult::Visible {
                continue;
            }
            let (bearing, valid) = camera.back_project3(&kp);
            assert!(valid);
            let dot = bearing.normalize().dot(&p.normalize());
            assert!((dot - 1.0).abs() < 1e-9, "dot = {} for {:?}", dot, p);
            checked += 1;
        }
        assert!(checked > 50);
    }
}

#[test]
fn random_points_round_trip() -> TestResult {
    let mut rng = StdRng::seed_from_u64(5);
    for camera in test_cameras() {
        for _ in 0..100 {
            let p = camera.random_visible_point_with(10.0, &mut rng)?;
            let (kp, result) = camera.project3(&p);
            assert_eq!(result, ProjectionResult::Visible);
            let (bearing, valid) = camera.back_project3(&kp);
            assert!(valid);
            assert!((bearing.normalize().dot(&p.normalize()) - 1.0).abs() < 1e-9);
        }
    }
    Ok(())
}

#[test]
fn points_below_depth_floor_are_invalid() {
    for camera in test_cameras() {
        for p in [
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, MIN_DEPTH),
            Vector3::new(0.0, 0.0, MIN_DEPTH * 0.5),
            Vector3::new(1e-11, 0.0, 5e-11),
        ] {
            let (_, result) = camera.project3(&p);
            assert_eq!(result, ProjectionResult::Invalid, "point {:?}", p);
        }
    }
}

#[test]
fn domain_guard_for_large_xi() -> TestResult {
    let mut rng = StdRng::seed_from_u64(9);
    for xi in [1.2, 2.0, 3.5] {
        let camera = UnifiedProjectionCamera::new_ideal(
            UnifiedIntrinsics::new(xi, 300.0, 300.0, 320.0, 240.0),
            ImageSize::new(640, 480),
        )?;
        for _ in 0..100 {
            let x = rng.random_range(-2.0..2.0);
            let y = rng.random_range(-2.0..2.0);
            let rho = f64::hypot(x, y);
            // z <= -(1/xi) * |p|  <=>  z <= -rho / sqrt(xi^2 - 1)
            let z = -rho / (xi * xi - 1.0).sqrt() - rng.random_range(0.0..1.0);
            let p = Vector3::new(x, y, z);
            assert!(z <= -p.norm() / xi);

            let projection = camera.project3_functional(&p, None, None, JacobianRequest::ALL);
            assert_eq!(projection.result, ProjectionResult::Invalid);
            assert_eq!(projection.keypoint, Vector2::zeros());
        }
    }
    Ok(())
}

#[test]
fn liftability_matches_back_projection() -> TestResult {
    let mut rng = StdRng::seed_from_u64(13);
    let mut cameras = test_cameras();
    cameras.push(UnifiedProjectionCamera::new(
        UnifiedIntrinsics::new(1.8, 250.0, 260.0, 320.0, 240.0),
        ImageSize::new(640, 480),
        LensDistortion::new(RadTanDistortion::new(-0.05, 0.01, 0.0, 0.0)),
    )?);

    for camera in cameras {
        for _ in 0..300 {
            let kp = Vector2::new(rng.random_range(0.0..640.0), rng.random_range(0.0..480.0));
            let (_, valid) = camera.back_project3(&kp);
            assert_eq!(camera.is_liftable(&kp), valid);
        }
    }
    Ok(())
}

#[test]
fn jacobian_requests_do_not_change_projection() {
    let mut rng = StdRng::seed_from_u64(21);
    for camera in test_cameras() {
        for _ in 0..50 {
            let p = camera.random_visible_point_with(3.0, &mut rng).unwrap();
            let plain = camera.project3_functional(&p, None, None, JacobianRequest::NONE);
            let full = camera.project3_functional(&p, None, None, JacobianRequest::ALL);
            assert_eq!(plain.keypoint, full.keypoint);
            assert_eq!(plain.result, full.result);

            let point_only = camera.project3_functional(
                &p,
                None,
                None,
                JacobianRequest {
                    point: true,
                    ..JacobianRequest::NONE
                },
            );
            assert_eq!(point_only.jacobian_point, full.jacobian_point);
            assert!(point_only.jacobian_distortion.is_none());
        }
    }
}

#[test]
fn camera_equality() -> TestResult {
    let intrinsics = UnifiedIntrinsics::new(0.9, 400.0, 400.0, 320.0, 240.0);
    let size = ImageSize::new(640, 480);

    let a = UnifiedProjectionCamera::new(
        intrinsics,
        size,
        LensDistortion::new(RadTanDistortion::test_distortion()),
    )?;
    let b = UnifiedProjectionCamera::new(
        intrinsics,
        size,
        LensDistortion::new(RadTanDistortion::test_distortion()),
    )?;
    let c = UnifiedProjectionCamera::new_ideal(intrinsics, size)?;
    let d = UnifiedProjectionCamera::new_ideal(intrinsics, size)?;

    assert_eq!(a, b);
    assert_eq!(c, d);
    assert_ne!(a, c);
    assert_ne!(c, a);

    let copy = a.clone();
    assert_eq!(copy, a);
    Ok(())
}
