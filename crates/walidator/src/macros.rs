//! Struct description macro

/// Defines a struct and implements [`Inspect`](crate::Inspect) for it.
///
/// Each field may carry `#[tag(...)]` attributes listing its annotations,
/// alongside doc comments and any other field attribute. The key matching the validator's tag name (`validate` by default) holds
/// the rules; the name tag (`json` by default) renames the field in error
/// paths.
///
/// ```
/// use walidator::inspect;
///
/// inspect! {
///     #[derive(Debug, Default)]
///     pub struct NewUserRequest {
///         #[tag(validate = "min=3,max=40,regexp=^[a-zA-Z]*$", json = "username")]
///         pub username: String,
///         #[tag(validate = "nonzero")]
///         pub name: String,
///         #[tag(validate = "min=18")]
///         pub age: i64,
///         pub description: String,
///     }
/// }
///
/// let req = NewUserRequest { username: "bob".into(), age: 17, ..Default::default() };
/// let errs = walidator::validate(&req).unwrap_err();
/// assert!(errs.is_zero_value("name"));
/// assert!(errs.is_min("age"));
/// ```
#[macro_export]
macro_rules! inspect {
    // Field annotations
    (@field $head:tt $name:ident $defs:tt $shapes:tt $attrs:tt [$($tags:tt)*]
        #[tag($($key:ident = $value:literal),* $(,)?)] $($rest:tt)*
    ) => {
        $crate::inspect!(@field $head $name $defs $shapes $attrs
            [$($tags)* $( (stringify!($key), $value), )*] $($rest)*);
    };
    // Any other field attribute, doc comments included
    (@field $head:tt $name:ident $defs:tt $shapes:tt [$($attrs:tt)*] $tags:tt
        #[$($attr:tt)*] $($rest:tt)*
    ) => {
        $crate::inspect!(@field $head $name $defs $shapes [$($attrs)* #[$($attr)*]] $tags $($rest)*);
    };
    (@field [$($head:tt)*] $name:ident [$($defs:tt)*]
        [$( ($field:ident [$($tags:tt)*] $field_ty:ty) )*] [] []
    ) => {
        $($head)* {
            $($defs)*
        }

        impl $crate::Inspect for $name {
            fn shape() -> $crate::Shape {
                $crate::Shape::Struct($crate::StructShape::new(
                    stringify!($name),
                    vec![
                        $(
                            $crate::FieldShape::new(
                                stringify!($field),
                                &[ $($tags)* ],
                                $crate::TypeRef::of::<$field_ty>(),
                            ),
                        )*
                    ],
                ))
            }

            fn type_ref(&self) -> $crate::TypeRef {
                $crate::TypeRef::of::<Self>()
            }

            fn view(&self) -> $crate::View<'_> {
                $crate::View::Struct(vec![ $( &self.$field as &dyn $crate::Inspect, )* ])
            }
        }
    };
    (@field $head:tt $name:ident [$($defs:tt)*] [$($shapes:tt)*] [$($attrs:tt)*] [$($tags:tt)*]
        $field_vis:vis $field:ident : $field_ty:ty $(, $($rest:tt)*)?
    ) => {
        $crate::inspect!(@field $head $name
            [$($defs)* $($attrs)* $field_vis $field: $field_ty,]
            [$($shapes)* ($field [$($tags)*] $field_ty)]
            [] [] $($($rest)*)?);
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($body:tt)*
        }
    ) => {
        $crate::inspect!(@field [$(#[$meta])* $vis struct $name] $name [] [] [] [] $($body)*);
    };
}

#[cfg(test)]
mod tests {
    use crate::{Inspect, Kind, Shape, View};

    crate::inspect! {
        #[derive(Debug, Default)]
        struct Described {
            /// Given name
            #[tag(validate = "nonzero", json = "first_name,omitempty")]
            first: String,
            #[allow(dead_code)]
            #[tag(check = "min=1")]
            /// Kept after the annotation too
            second: i32,
            #[tag(validate = "-")]
            third: Option<Box<Described>>,
        }
    }

    #[test]
    fn test_struct_shape() {
        let Shape::Struct(shape) = Described::shape() else {
            panic!("expected struct shape");
        };
        assert_eq!(shape.name, "Described");
        let names: Vec<_> = shape.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);

        assert_eq!(shape.fields[0].tag("validate"), Some("nonzero"));
        assert_eq!(shape.fields[0].tag("json"), Some("first_name,omitempty"));
        assert_eq!(shape.fields[1].tag("validate"), None);
        assert_eq!(shape.fields[1].tag("check"), Some("min=1"));
        assert_eq!(shape.fields[2].ty.shape().kind(), Kind::Optional);
    }

    #[test]
    fn test_struct_view_in_declaration_order() {
        let value = Described {
            first: "a".to_string(),
            second: 2,
            third: None,
        };
        let View::Struct(fields) = value.view() else {
            panic!("expected struct view");
        };
        assert_eq!(fields.len(), 3);
        assert!(matches!(fields[0].view(), View::Str("a")));
        assert!(matches!(fields[1].view(), View::Int(2)));
        assert!(matches!(fields[2].view(), View::Pointer(None)));
    }
}
