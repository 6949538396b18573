// Gradient checks: analytic gradients from Graph::backward against central
// differences, for every operator alone and inside composed graphs.
//
// Inputs are random but seeded. Ranges keep every operator inside its smooth
// domain (positive inputs for ln / sqrt / pow, bases away from 1 for
// log_base).

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use elham::prelude::*;

const EPS: f64 = 1e-5;

fn rng() -> StdRng {
    StdRng::seed_from_u64(0x5eed)
}

fn random(rng: &mut StdRng, shape: impl Into<Shape>, lo: f64, hi: f64) -> Result<Array> {
    let shape = shape.into();
    let data = (0..shape.elem_count())
        .map(|_| rng.gen_range(lo..hi))
        .collect();
    Array::from_vec(data, shape)
}

fn var(rng: &mut StdRng, name: &str, shape: impl Into<Shape>, lo: f64, hi: f64) -> Result<Node> {
    Ok(Node::variable(random(rng, shape, lo, hi)?, name))
}

/// Run forward + backward on `root` and compare every variable's gradient
/// with a central-difference estimate.
fn check(root: &Node) -> Result<()> {
    let graph = Graph::new(root);
    graph.forward()?;
    graph.backward()?;

    let analytic: Vec<(Node, Array)> = graph
        .variables()
        .into_iter()
        .map(|v| Ok((v.clone(), v.grad()?)))
        .collect::<Result<_>>()?;
    assert!(!analytic.is_empty());

    for (v, grad) in &analytic {
        let numeric = finite_diff_grad(&graph, v, EPS)?;
        assert_eq!(grad.shape(), numeric.shape(), "shape of grad for {}", v.name());
        for (i, (&a, &n)) in grad.data().iter().zip(numeric.data()).enumerate() {
            assert!(
                approx::relative_eq!(a, n, epsilon = 1e-6, max_relative = 1e-4),
                "{}[{}]: analytic {} vs numeric {}",
                v.name(),
                i,
                a,
                n
            );
        }
    }
    Ok(())
}

// Single operators

#[test]
fn test_add_with_broadcast() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", (2, 3), -1.0, 1.0)?;
    let b = var(&mut rng, "b", 3, -1.0, 1.0)?;
    check(&Node::add(&a, &b, "y"))
}

#[test]
fn test_sub_with_broadcast() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", 3, -1.0, 1.0)?;
    let b = var(&mut rng, "b", (2, 3), -1.0, 1.0)?;
    check(&Node::sub(&a, &b, "y"))
}

#[test]
fn test_mul_outer_broadcast() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", (2, 1), -1.0, 1.0)?;
    let b = var(&mut rng, "b", (1, 3), -1.0, 1.0)?;
    check(&Node::mul(&a, &b, "y"))
}

#[test]
fn test_div() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", (2, 3), -1.0, 1.0)?;
    let b = var(&mut rng, "b", (2, 3), 0.5, 2.0)?;
    check(&Node::div(&a, &b, "y"))
}

#[test]
fn test_pow() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", 4, 0.5, 2.0)?;
    let b = var(&mut rng, "b", 4, 0.5, 2.5)?;
    check(&Node::pow(&a, &b, "y"))
}

#[test]
fn test_pow_scalar_exponent() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", (2, 2), 0.5, 2.0)?;
    let b = var(&mut rng, "b", (), 1.5, 3.0)?;
    check(&Node::pow(&a, &b, "y"))
}

#[test]
fn test_unary_ops() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", (2, 2), 0.5, 2.0)?;
    check(&Node::ln(&a, "ln"))?;
    check(&Node::exp(&a, "exp"))?;
    check(&Node::sqrt(&a, "sqrt"))
}

#[test]
fn test_log_base() -> Result<()> {
    let mut rng = rng();
    let x = var(&mut rng, "x", 3, 0.5, 4.0)?;
    let base = var(&mut rng, "base", (), 2.0, 4.0)?;
    check(&Node::log_base(&x, &base, "y"))
}

#[test]
fn test_matmul() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", (2, 3), -1.0, 1.0)?;
    let b = var(&mut rng, "b", (3, 4), -1.0, 1.0)?;
    check(&Node::matmul(&a, &b, "y"))
}

#[test]
fn test_dot() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", 5, -1.0, 1.0)?;
    let b = var(&mut rng, "b", 5, -1.0, 1.0)?;
    check(&Node::dot(&a, &b, "y"))
}

#[test]
fn test_cross() -> Result<()> {
    let mut rng = rng();
    let a = var(&mut rng, "a", 3, -1.0, 1.0)?;
    let b = var(&mut rng, "b", 3, -1.0, 1.0)?;
    check(&Node::cross(&a, &b, "y"))
}

// Composed graphs

#[test]
fn test_composed_elementwise() -> Result<()> {
    // y = sqrt(a * b + c) / exp(a) - ln(c)
    let mut rng = rng();
    let a = var(&mut rng, "a", (2, 3), 0.2, 1.0)?;
    let b = var(&mut rng, "b", 3, 0.5, 1.5)?;
    let c = var(&mut rng, "c", (2, 1), 0.5, 1.5)?;
    let inner = Node::add(&Node::mul(&a, &b, ""), &c, "inner");
    let num = Node::sqrt(&inner, "num");
    let y = Node::sub(&Node::div(&num, &Node::exp(&a, ""), ""), &Node::ln(&c, ""), "y");
    check(&y)
}

#[test]
fn test_composed_linear_algebra() -> Result<()> {
    // y = dot(cross(u, v), w) * log_base(matmul(A, B) + 3, base)
    let mut rng = rng();
    let u = var(&mut rng, "u", 3, -1.0, 1.0)?;
    let v = var(&mut rng, "v", 3, -1.0, 1.0)?;
    let w = var(&mut rng, "w", 3, -1.0, 1.0)?;
    let a = var(&mut rng, "A", (2, 3), -0.5, 0.5)?;
    let b = var(&mut rng, "B", (3, 2), -0.5, 0.5)?;
    let base = var(&mut rng, "base", (), 2.0, 3.0)?;
    let three = Node::constant(Array::scalar(3.0), "three");

    let triple = Node::dot(&Node::cross(&u, &v, ""), &w, "triple");
    let shifted = Node::add(&Node::matmul(&a, &b, ""), &three, "shifted");
    let logs = Node::log_base(&shifted, &base, "logs");
    check(&Node::mul(&triple, &logs, "y"))
}

#[test]
fn test_composed_with_shared_subexpression() -> Result<()> {
    // s = x * y is used three times
    let mut rng = rng();
    let x = var(&mut rng, "x", 4, 0.5, 1.5)?;
    let y = var(&mut rng, "y", 4, 0.5, 1.5)?;
    let s = &x * &y;
    let root = Node::pow(&s, &Node::exp(&s, ""), "") + (&s / &x);
    check(&root)
}

#[test]
fn test_numeric_estimate_is_exact_for_linear_graph() -> Result<()> {
    let x = Node::variable(Array::from_nested([1.0, -2.0, 0.5])?, "x");
    let k = Node::constant(Array::from_nested([2.0, 3.0, 4.0])?, "k");
    let y = &x * &k;
    let graph = Graph::new(&y);
    graph.forward()?;
    graph.backward()?;
    let analytic = x.grad()?;
    let numeric = finite_diff_grad(&graph, &x, 1e-3)?;
    assert_relative_eq!(max_grad_error(&analytic, &numeric)?, 0.0, epsilon = 1e-9);
    Ok(())
}
