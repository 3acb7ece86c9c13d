pub mod dynamic;
pub mod measurement;

pub trait DynamicModel {
    type State;
    type Input;
    type Covariance;
    type Jacobian;

    fn f(&self, x: &Self::State, u: &Self::Input) -> Self::State;
    fn F(&self, x: &Self::State, u: &Self::Input) -> Self::Jacobian;
    fn Q(&self) -> Self::Covariance;
}

pub trait MeasurementModel {
    type State;
    type Measurement;
    type Jacobian;
    type Covariance;

    fn h(&self, x: &Self::State) -> Self::Measurement;
    fn H(&self, x: &Self::State) -> Self::Jacobian;
    fn R(&self) -> Self::Covariance;
}
