/// Forwards arithmetic on a single-field newtype to the value it wraps.
///
/// ```ignore
/// op!(Paise; binary Add::add, Sub::sub);
/// op!(Paise; assign AddAssign::add_assign);
/// op!(Paise; unary Neg::neg);
/// op!(Paise; scale Mul::mul by i64);
/// op!(Paise; sum);
/// ```
#[macro_export]
macro_rules! op {
    ($t:ident; binary $($tr:ident :: $f:ident),+) => {
        $(impl std::ops::$tr for $t {
            type Output = Self;

            fn $f(self, rhs: Self) -> Self::Output {
                Self(std::ops::$tr::$f(self.0, rhs.0))
            }
        })+
    };

    ($t:ident; assign $($tr:ident :: $f:ident),+) => {
        $(impl std::ops::$tr for $t {
            fn $f(&mut self, rhs: Self) {
                std::ops::$tr::$f(&mut self.0, rhs.0)
            }
        })+
    };

    ($t:ident; unary $($tr:ident :: $f:ident),+) => {
        $(impl std::ops::$tr for $t {
            type Output = Self;

            fn $f(self) -> Self::Output {
                Self(std::ops::$tr::$f(self.0))
            }
        })+
    };

    ($t:ident; scale $tr:ident :: $f:ident by $s:ty) => {
        impl std::ops::$tr<$s> for $t {
            type Output = Self;

            fn $f(self, rhs: $s) -> Self::Output {
                Self(std::ops::$tr::$f(self.0, rhs))
            }
        }
    };

    ($t:ident; sum) => {
        impl std::iter::Sum for $t {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|v| v.0).sum())
            }
        }
    };
}
