//! Derivative-free minimisation for model parameter estimation

/// Result of a Nelder-Mead run
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Number of iterations performed
    pub iterations: usize,
    /// Whether the simplex converged within the tolerance
    pub converged: bool,
}

/// Nelder-Mead configuration
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Convergence tolerance on the spread of objective values
    pub tolerance: f64,
    /// Reflection coefficient
    pub alpha: f64,
    /// Expansion coefficient
    pub gamma: f64,
    /// Contraction coefficient
    pub rho: f64,
    /// Shrink coefficient
    pub sigma: f64,
    /// Relative size of the initial simplex
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.1,
        }
    }
}

fn clamp_to_bounds(point: &mut [f64], bounds: Option<&[(f64, f64)]>) {
    if let Some(bounds) = bounds {
        for (value, (low, high)) in point.iter_mut().zip(bounds.iter()) {
            *value = value.clamp(*low, *high);
        }
    }
}

fn offset_point(
    centroid: &[f64],
    worst: &[f64],
    bounds: Option<&[(f64, f64)]>,
    coefficient: f64,
) -> Vec<f64> {
    let mut point: Vec<f64> = centroid
        .iter()
        .zip(worst.iter())
        .map(|(c, w)| c + coefficient * (c - w))
        .collect();
    clamp_to_bounds(&mut point, bounds);
    point
}

fn evaluate<F>(objective: &F, point: &[f64]) -> f64
where
    F: Fn(&[f64]) -> f64,
{
    let value = objective(point);
    if value.is_finite() {
        value
    } else {
        f64::MAX
    }
}

/// Minimise `objective` starting from `initial`.
///
/// Points are clamped into `bounds` after every simplex move. Non-finite
/// objective values are treated as `f64::MAX`. The run is deterministic for
/// a given objective, start point and configuration.
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return NelderMeadResult {
            point: Vec::new(),
            value: evaluate(&objective, &[]),
            iterations: 0,
            converged: true,
        };
    }

    let mut start = initial.to_vec();
    clamp_to_bounds(&mut start, bounds);

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.clone());
    for i in 0..n {
        let mut vertex = start.clone();
        let step = if vertex[i].abs() > 1e-8 {
            config.initial_step * vertex[i].abs()
        } else {
            config.initial_step
        };
        vertex[i] += step;
        clamp_to_bounds(&mut vertex, bounds);
        if vertex[i] == start[i] {
            // Clamped back onto the start point: step inwards instead.
            vertex[i] -= 2.0 * step;
            clamp_to_bounds(&mut vertex, bounds);
        }
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| evaluate(&objective, v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        if (values[n] - values[0]).abs() <= config.tolerance * (1.0 + values[0].abs()) {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();

        let reflected = offset_point(&centroid, &simplex[n], bounds, config.alpha);
        let reflected_value = evaluate(&objective, &reflected);

        if reflected_value < values[0] {
            let expanded = offset_point(&centroid, &simplex[n], bounds, config.alpha * config.gamma);
            let expanded_value = evaluate(&objective, &expanded);
            if expanded_value < reflected_value {
                simplex[n] = expanded;
                values[n] = expanded_value;
            } else {
                simplex[n] = reflected;
                values[n] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[n - 1] {
            simplex[n] = reflected;
            values[n] = reflected_value;
            continue;
        }

        let contracted = if reflected_value < values[n] {
            offset_point(&centroid, &simplex[n], bounds, config.alpha * config.rho)
        } else {
            offset_point(&centroid, &simplex[n], bounds, -config.rho)
        };
        let contracted_value = evaluate(&objective, &contracted);
        if contracted_value < values[n].min(reflected_value) {
            simplex[n] = contracted;
            values[n] = contracted_value;
            continue;
        }

        let best = simplex[0].clone();
        for i in 1..=n {
            let mut shrunk: Vec<f64> = best
                .iter()
                .zip(simplex[i].iter())
                .map(|(b, v)| b + config.sigma * (v - b))
                .collect();
            clamp_to_bounds(&mut shrunk, bounds);
            values[i] = evaluate(&objective, &shrunk);
            simplex[i] = shrunk;
        }
    }

    let best = (0..=n)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .unwrap_or(0);

    NelderMeadResult {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    }
}
