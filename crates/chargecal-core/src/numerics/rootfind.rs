//! Bracketed scalar root finding.

/// Absolute convergence tolerance on the root position.
const XTOL: f64 = 2.0e-12;
/// Relative convergence tolerance on the root position.
const RTOL: f64 = 4.0 * f64::EPSILON;
const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RootFindError {
    #[error("bracket endpoints must be finite and ordered, got [{lower}, {upper}]")]
    InvalidBracket { lower: f64, upper: f64 },
    #[error(
        "no sign change over the bracket: f(lower)={f_lower}, f(upper)={f_upper}"
    )]
    NoSignChange { f_lower: f64, f_upper: f64 },
    #[error("function evaluated to a non-finite value {value} at x={at}")]
    NonFiniteEvaluation { at: f64, value: f64 },
    #[error("root finder failed to converge within {max_iterations} iterations")]
    NoConvergence { max_iterations: usize },
}

/// Brent's method: inverse-quadratic and secant steps guarded by
/// bisection. Requires a sign change over `[lower, upper]`.
pub fn find_root_brent<F>(f: F, lower: f64, upper: f64) -> Result<f64, RootFindError>
where
    F: Fn(f64) -> f64,
{
    if !lower.is_finite() || !upper.is_finite() || lower >= upper {
        return Err(RootFindError::InvalidBracket { lower, upper });
    }

    let mut xpre = lower;
    let mut xcur = upper;
    let mut fpre = evaluate(&f, xpre)?;
    let mut fcur = evaluate(&f, xcur)?;

    if fpre == 0.0 {
        return Ok(xpre);
    }
    if fcur == 0.0 {
        return Ok(xcur);
    }
    if fpre.signum() == fcur.signum() {
        return Err(RootFindError::NoSignChange {
            f_lower: fpre,
            f_upper: fcur,
        });
    }

    let mut xblk = 0.0;
    let mut fblk = 0.0;
    let mut spre = 0.0;
    let mut scur = 0.0;

    for _ in 0..MAX_ITERATIONS {
        if fpre != 0.0 && fcur != 0.0 && fpre.signum() != fcur.signum() {
            xblk = xpre;
            fblk = fpre;
            spre = xcur - xpre;
            scur = spre;
        }
        if fblk.abs() < fcur.abs() {
            xpre = xcur;
            xcur = xblk;
            xblk = xpre;
            fpre = fcur;
            fcur = fblk;
            fblk = fpre;
        }

        let delta = (XTOL + RTOL * xcur.abs()) / 2.0;
        let sbis = (xblk - xcur) / 2.0;
        if fcur == 0.0 || sbis.abs() < delta {
            return Ok(xcur);
        }

        if spre.abs() > delta && fcur.abs() < fpre.abs() {
            let stry = if xpre == xblk {
                // secant step
                -fcur * (xcur - xpre) / (fcur - fpre)
            } else {
                // inverse quadratic step
                let dpre = (fpre - fcur) / (xpre - xcur);
                let dblk = (fblk - fcur) / (xblk - xcur);
                -fcur * (fblk * dblk - fpre * dpre) / (dblk * dpre * (fblk - fpre))
            };

            if 2.0 * stry.abs() < spre.abs().min(3.0 * sbis.abs() - delta) {
                spre = scur;
                scur = stry;
            } else {
                spre = sbis;
                scur = sbis;
            }
        } else {
            spre = sbis;
            scur = sbis;
        }

        xpre = xcur;
        fpre = fcur;
        if scur.abs() > delta {
            xcur += scur;
        } else {
            xcur += if sbis > 0.0 { delta } else { -delta };
        }
        fcur = evaluate(&f, xcur)?;
    }

    Err(RootFindError::NoConvergence {
        max_iterations: MAX_ITERATIONS,
    })
}

fn evaluate<F>(f: &F, x: f64) -> Result<f64, RootFindError>
where
    F: Fn(f64) -> f64,
{
    let value = f(x);
    if !value.is_finite() {
        return Err(RootFindError::NonFiniteEvaluation { at: x, value });
    }
    Ok(value)
}
