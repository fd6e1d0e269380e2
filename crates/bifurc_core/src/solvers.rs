use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// Classic fixed-step Runge-Kutta 4th order solver.
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }

    fn stage(&mut self, state: &[T], slope_from: usize, scale: T) {
        let slope = match slope_from {
            1 => &self.k1,
            2 => &self.k2,
            _ => &self.k3,
        };
        for ((tmp, &y), &k) in self.tmp.iter_mut().zip(state).zip(slope) {
            *tmp = y + scale * k;
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::constant(0.5);
        let sixth = T::constant(1.0 / 6.0);
        let two = T::constant(2.0);
        let t0 = *t;

        system.apply(t0, state, &mut self.k1);

        self.stage(state, 1, dt * half);
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        self.stage(state, 2, dt * half);
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        self.stage(state, 3, dt);
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }
        *t = t0 + dt;
    }
}
