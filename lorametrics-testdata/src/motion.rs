// LoRaMetrics Testdata - Device motion
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Device placement and random-waypoint motion inside a disc centered on
//! the gateway.

use rand::Rng;
use std::f64::consts::TAU;

/// Uniform-radius point in a disc of `radius` meters.
///
/// Radius is drawn uniformly, so devices cluster toward the gateway.
pub fn random_disc_point<R: Rng + ?Sized>(rng: &mut R, radius: f64) -> (f64, f64) {
    let theta = rng.gen_range(0.0..TAU);
    let rho = if radius > 0.0 {
        rng.gen_range(0.0..radius)
    } else {
        0.0
    };
    (rho * theta.cos(), rho * theta.sin())
}

/// Position state of one device.
#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    Static {
        position: (f64, f64),
    },
    /// Random waypoint with zero pause.
    Waypoint {
        position: (f64, f64),
        target: (f64, f64),
        speed: f64,
        speed_range: (f64, f64),
        radius: f64,
    },
}

impl Motion {
    pub fn fixed<R: Rng + ?Sized>(rng: &mut R, radius: f64) -> Self {
        Motion::Static {
            position: random_disc_point(rng, radius),
        }
    }

    pub fn waypoint<R: Rng + ?Sized>(rng: &mut R, radius: f64, speed_range: (f64, f64)) -> Self {
        let position = random_disc_point(rng, radius);
        let target = random_disc_point(rng, radius);
        Motion::Waypoint {
            position,
            target,
            speed: draw_speed(rng, speed_range),
            speed_range,
            radius,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        match self {
            Motion::Static { position } | Motion::Waypoint { position, .. } => *position,
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self, Motion::Waypoint { .. })
    }

    /// Move for `dt` seconds, picking new waypoints as they are reached.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R, dt: f64) {
        let Motion::Waypoint {
            position,
            target,
            speed,
            speed_range,
            radius,
        } = self
        else {
            return;
        };

        let mut remaining = dt.max(0.0);
        while remaining > 0.0 {
            let (dx, dy) = (target.0 - position.0, target.1 - position.1);
            let gap = (dx * dx + dy * dy).sqrt();
            if *speed <= 0.0 {
                return;
            }
            let reach = gap / *speed;
            if reach > remaining {
                let step = *speed * remaining;
                position.0 += dx / gap * step;
                position.1 += dy / gap * step;
                return;
            }
            *position = *target;
            remaining -= reach;
            *target = random_disc_point(rng, *radius);
            *speed = draw_speed(rng, *speed_range);
        }
    }
}

fn draw_speed<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn norm((x, y): (f64, f64)) -> f64 {
        (x * x + y * y).sqrt()
    }

    #[test]
    fn test_disc_points_stay_inside() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            assert!(norm(random_disc_point(&mut rng, 250.0)) < 250.0);
        }
        assert_eq!(random_disc_point(&mut rng, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_static_never_moves() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut motion = Motion::fixed(&mut rng, 500.0);
        let start = motion.position();
        motion.advance(&mut rng, 3600.0);
        assert_eq!(motion.position(), start);
        assert!(!motion.is_mobile());
    }

    #[test]
    fn test_waypoint_moves_within_area() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut motion = Motion::waypoint(&mut rng, 1000.0, (1.0, 5.0));
        let start = motion.position();

        for _ in 0..100 {
            let before = motion.position();
            motion.advance(&mut rng, 15.0);
            let after = motion.position();
            let step = norm((after.0 - before.0, after.1 - before.1));
            // Bounded by the top speed
            assert!(step <= 5.0 * 15.0 + 1e-9);
            assert!(norm(after) < 1000.0 + 1e-9);
        }
        assert_ne!(motion.position(), start);
    }
}
