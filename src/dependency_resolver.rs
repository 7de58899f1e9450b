use crate::{
    dependency::{Arguments, Dependency},
    errors::ResolveErrorKind,
};

/// Injection marker (or a tuple of them) that declares its dependencies
/// and then takes its values from the resolved [`Arguments`]
pub trait DependencyResolver: Sized {
    fn dependencies() -> Vec<Dependency>;

    fn resolve(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind>;
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver + Send, )*
        {
            #[inline]
            fn dependencies() -> Vec<Dependency> {
                let mut dependencies = Vec::new();
                $( dependencies.extend($ty::dependencies()); )*
                dependencies
            }

            #[inline]
            #[allow(unused_variables)]
            fn resolve(arguments: &mut Arguments) -> Result<Self, ResolveErrorKind> {
                Ok(($($ty::resolve(arguments)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
