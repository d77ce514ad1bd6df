//! The `migration_record!` macro for defining versioned record shapes.

/// Define a versioned record shape.
///
/// Expands to the struct itself, a zero-valued [`Default`] (built from
/// [`ColumnValue::zero`](crate::record::ColumnValue::zero), so timestamp
/// fields work), and a [`Record`](crate::Record) implementation reporting the
/// type name and fields to the mapper.
///
/// Field tags go in brackets after the type: `[pk]`, `[notnull]`,
/// `[size(127)]`. An integer field named `id` is the primary key without any
/// tag.
///
/// ```
/// use reversio::migration_record;
/// use reversio::Record;
///
/// migration_record! {
///     /// Version 1 of the article table.
///     struct Article_migration1 {
///         id: i64,
///         author: String [size(127)],
///         content: String [size(255)],
///     }
/// }
///
/// let article = Article_migration1::default();
/// assert_eq!(article.type_name(), "Article_migration1");
/// assert_eq!(article.id, 0);
/// ```
#[macro_export]
macro_rules! migration_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $fname:ident : $fty:ty $([ $($tag:ident $(( $tagarg:expr ))? ),+ $(,)? ])?
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            $( pub $fname : $fty, )+
        }

        impl ::std::default::Default for $name {
            fn default() -> Self {
                Self {
                    $( $fname: <$fty as $crate::record::ColumnValue>::zero(), )+
                }
            }
        }

        impl $crate::record::Record for $name {
            fn type_name(&self) -> &'static str {
                ::std::stringify!($name)
            }

            fn fields(&self) -> ::std::vec::Vec<$crate::record::FieldSpec> {
                ::std::vec![
                    $(
                        $crate::record::FieldSpec::new::<$fty>(::std::stringify!($fname))
                            $($( . $tag($($tagarg)?) )+)? ,
                    )+
                ]
            }

            fn get(&self, field: &str) -> ::std::option::Option<$crate::record::Value> {
                match field {
                    $(
                        ::std::stringify!($fname) => ::std::option::Option::Some(
                            $crate::record::ColumnValue::to_value(&self.$fname),
                        ),
                    )+
                    _ => ::std::option::Option::None,
                }
            }

            fn set(
                &mut self,
                field: &str,
                value: $crate::record::Value,
            ) -> ::std::result::Result<(), $crate::Error> {
                match field {
                    $(
                        ::std::stringify!($fname) => {
                            self.$fname = <$fty as $crate::record::ColumnValue>::from_value(value)?;
                            ::std::result::Result::Ok(())
                        }
                    )+
                    _ => ::std::result::Result::Err($crate::Error::Generic(::std::format!(
                        "record {} has no field named {}",
                        ::std::stringify!($name),
                        field,
                    ))),
                }
            }
        }
    };
}
