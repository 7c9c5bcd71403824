//! Implementation of the `#[aware]` attribute.
//!
//! The annotated function keeps its signature. Its body becomes:
//!
//! ```ignore
//! fn sum(c: &Crumb, a: i64, b: Option<i64>) -> i64 {
//!     let b: i64 = match b { Some(v) => v, None => 1 };      // #[crumb(default = 1)]
//!     let __bc_invocation = {
//!         let mut __bc_args = CapturedArgs::new();
//!         __bc_args.redact("a");                              // redact_params = "a"
//!         __bc_args.capture("b", &b);
//!         Invocation::new(concat!(module_path!(), "::sum"), __bc_args, AttachPolicy::OnSuccess)
//!     };
//!     __bc_invocation.run(|| -> i64 { a + b }).attach_to(&c)
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2, TokenTree};
use quote::{quote, ToTokens};
use syn::{
    ext::IdentExt, parse::Parser, parse_macro_input, spanned::Spanned, Attribute, Error, Expr,
    ExprLit, FnArg, GenericArgument, Ident, ItemFn, Lit, LitStr, Pat, PathArguments, ReturnType,
    Type, TypePath,
};

/// Options given inside `#[aware(...)]`.
#[derive(Default)]
struct AwareArgs {
    trail_param: Option<LitStr>,
    redact_params: Vec<LitStr>,
    attach_always: bool,
    title: Option<LitStr>,
}

impl AwareArgs {
    fn parse(attr: TokenStream2) -> syn::Result<Self> {
        let mut args = AwareArgs::default();
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("trail_param") {
                args.trail_param = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("redact_params") {
                let value: Expr = meta.value()?.parse()?;
                args.redact_params.extend(parse_names(&value)?);
                Ok(())
            } else if meta.path.is_ident("attach") {
                let lit: LitStr = meta.value()?.parse()?;
                args.attach_always = match lit.value().as_str() {
                    "always" => true,
                    "on_success" => false,
                    _ => {
                        return Err(Error::new(
                            lit.span(),
                            "attach must be \"on_success\" or \"always\"",
                        ))
                    }
                };
                Ok(())
            } else if meta.path.is_ident("title") {
                args.title = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error(
                    "unsupported aware option; expected trail_param, redact_params, attach or title",
                ))
            }
        });
        parser.parse2(attr)?;
        Ok(args)
    }
}

/// Accepts `"a"`, `["a", "b"]` or `("a", "b")`.
fn parse_names(value: &Expr) -> syn::Result<Vec<LitStr>> {
    let as_str = |expr: &Expr| match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.clone()),
        other => Err(Error::new(
            other.span(),
            "redact_params entries must be string literals",
        )),
    };
    match value {
        Expr::Array(array) => array.elems.iter().map(as_str).collect(),
        Expr::Tuple(tuple) => tuple.elems.iter().map(as_str).collect(),
        Expr::Paren(paren) => Ok(vec![as_str(&paren.expr)?]),
        other => Ok(vec![as_str(other)?]),
    }
}

/// Options given by `#[crumb(...)]` on a single parameter.
#[derive(Default)]
struct ParamOptions {
    skip: bool,
    default: Option<Expr>,
}

fn take_param_options(attrs: &mut Vec<Attribute>) -> syn::Result<ParamOptions> {
    let mut options = ParamOptions::default();
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if !attr.path().is_ident("crumb") {
            kept.push(attr);
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else if meta.path.is_ident("default") {
                options.default = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `default = ...`"))
            }
        })?;
    }
    *attrs = kept;
    Ok(options)
}

struct ParamInfo {
    ident: Option<Ident>,
    name: String,
    mutable: bool,
    ty: Type,
    options: ParamOptions,
    span: Span,
}

pub fn aware_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = TokenStream2::from(attr);
    let func = parse_macro_input!(item as ItemFn);
    match expand(attr, func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(attr: TokenStream2, mut func: ItemFn) -> syn::Result<TokenStream2> {
    let args = AwareArgs::parse(attr)?;

    let mut has_receiver = false;
    let mut params = Vec::new();
    for input in func.sig.inputs.iter_mut() {
        match input {
            FnArg::Receiver(_) => has_receiver = true,
            FnArg::Typed(pat_type) => {
                let options = take_param_options(&mut pat_type.attrs)?;
                let span = pat_type.span();
                let (ident, mutable) = match &mut *pat_type.pat {
                    Pat::Ident(pat_ident) => {
                        let mutable = pat_ident.mutability.is_some();
                        // The defaulted value is rebound in the body, which carries the `mut`.
                        if options.default.is_some() {
                            pat_ident.mutability = None;
                        }
                        (Some(pat_ident.ident.clone()), mutable)
                    }
                    _ => (None, false),
                };
                let name = ident
                    .as_ref()
                    .map(|i| i.unraw().to_string())
                    .unwrap_or_default();
                params.push(ParamInfo {
                    ident,
                    name,
                    mutable,
                    ty: (*pat_type.ty).clone(),
                    options,
                    span,
                });
            }
        }
    }

    // Trail parameter
    let trail_name = args.trail_param.as_ref().map(LitStr::value);
    let attach = match (&args.trail_param, trail_name.as_deref()) {
        (Some(lit), Some("self")) => {
            if !has_receiver {
                return Err(Error::new(
                    lit.span(),
                    "trail_param = \"self\" requires a method with a receiver",
                ));
            }
            quote!(.attach_to(&self))
        }
        (Some(lit), Some(name)) => {
            let param = params
                .iter()
                .find(|p| p.ident.is_some() && p.name == name)
                .ok_or_else(|| Error::new(lit.span(), format!("no parameter named `{}`", name)))?;
            if param.options.default.is_some() {
                return Err(Error::new(
                    param.span,
                    "the trail parameter cannot take a default",
                ));
            }
            let ident = &param.ident;
            quote!(.attach_to(&#ident))
        }
        _ => quote!(.attach_ambient()),
    };

    // Redacted parameters
    let mut redacted = Vec::new();
    for lit in &args.redact_params {
        let name = lit.value();
        if trail_name.as_deref() == Some(name.as_str()) {
            return Err(Error::new(lit.span(), "the trail parameter cannot be redacted"));
        }
        if !params.iter().any(|p| p.ident.is_some() && p.name == name) {
            return Err(Error::new(lit.span(), format!("no parameter named `{}`", name)));
        }
        redacted.push(name);
    }

    // Defaults and captures
    let mut defaults = Vec::new();
    let mut captures = Vec::new();
    for param in &params {
        let is_trail = trail_name.as_deref() == Some(param.name.as_str());
        if param.ident.is_none() && !param.options.skip {
            return Err(Error::new(
                param.span,
                "aware parameters must be plain identifiers; add #[crumb(skip)] to leave one out",
            ));
        }
        let Some(ident) = &param.ident else {
            continue;
        };

        if let Some(default) = &param.options.default {
            let inner = option_inner(&param.ty).ok_or_else(|| {
                Error::new(
                    param.ty.span(),
                    "#[crumb(default = ...)] requires an Option<T> parameter",
                )
            })?;
            let mutability = param.mutable.then(|| quote!(mut));
            defaults.push(quote! {
                let #mutability #ident: #inner = match #ident {
                    ::core::option::Option::Some(__bc_value) => __bc_value,
                    ::core::option::Option::None => #default,
                };
            });
        }

        let name = &param.name;
        if redacted.contains(name) {
            captures.push(quote!(__bc_args.redact(#name);));
        } else if !param.options.skip && !is_trail {
            captures.push(quote!(__bc_args.capture(#name, &#ident);));
        }
    }

    // Title
    let fn_name = func.sig.ident.unraw().to_string();
    let title = match &args.title {
        Some(title) => quote!(::std::string::String::from(#title)),
        None if has_receiver => quote! {
            ::std::format!("{}::{}", ::core::any::type_name::<Self>(), #fn_name)
        },
        None => quote! {
            ::std::string::String::from(::core::concat!(::core::module_path!(), "::", #fn_name))
        },
    };

    let policy = if args.attach_always {
        quote!(::breadcrumbs_core::aware::AttachPolicy::Always)
    } else {
        quote!(::breadcrumbs_core::aware::AttachPolicy::OnSuccess)
    };

    // Body
    let fallible = returns_result(&func.sig.output);
    let pin_type = match &func.sig.output {
        ReturnType::Type(_, ty) if !contains_impl(ty.to_token_stream()) => Some(ty.clone()),
        _ => None,
    };
    let block = &func.block;
    let run = match (func.sig.asyncness.is_some(), fallible) {
        (false, false) => quote!(run),
        (false, true) => quote!(run_fallible),
        (true, false) => quote!(run_async),
        (true, true) => quote!(run_fallible_async),
    };
    let call = if func.sig.asyncness.is_some() {
        let future = match &pin_type {
            Some(ty) => quote!(::breadcrumbs_core::aware::expect_output::<#ty, _>(async #block)),
            None => quote!(async #block),
        };
        quote!(__bc_invocation.#run(#future).await #attach)
    } else {
        let closure = match &pin_type {
            Some(ty) => quote!(|| -> #ty #block),
            None => quote!(|| #block),
        };
        quote!(__bc_invocation.#run(#closure) #attach)
    };

    let attrs = &func.attrs;
    let vis = &func.vis;
    let sig = &func.sig;
    Ok(quote! {
        #(#attrs)*
        #vis #sig {
            #(#defaults)*
            let __bc_invocation = {
                #[allow(unused_mut)]
                let mut __bc_args = ::breadcrumbs_core::aware::CapturedArgs::new();
                #(#captures)*
                ::breadcrumbs_core::aware::Invocation::new(#title, __bc_args, #policy)
            };
            #call
        }
    })
}

/// `T` for an `Option<T>` type written as a path.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return None;
    };
    let segment = path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match (args.args.len(), args.args.first()?) {
        (1, GenericArgument::Type(inner)) => Some(inner),
        _ => None,
    }
}

/// Whether the declared return type is some `...::Result<..>`.
fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(TypePath { path, .. }) => path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "Result"),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

/// Closures and async blocks cannot name `impl Trait` output types.
fn contains_impl(tokens: TokenStream2) -> bool {
    tokens.into_iter().any(|tree| match tree {
        TokenTree::Ident(ident) => ident == "impl",
        TokenTree::Group(group) => contains_impl(group.stream()),
        _ => false,
    })
}
