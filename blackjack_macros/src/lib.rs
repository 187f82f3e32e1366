use proc_macro::TokenStream as TokenStream1;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};

/// This macro is added before a method of the `Round` struct in the impl block.
/// Use this macro to first check if the round is exactly in the phase given in
/// the attribute.
///
/// For example, `#[allowed_phase(Playing)]` will make `hit` first check if the
/// round is currently `RoundPhase::Playing`. If not, the method returns
/// `RoundError::WrongPhase` naming the method, the expected phase and the
/// actual one.
///
/// The annotated method must return `Result<_, RoundError>`, and both
/// `RoundPhase` and `RoundError` must be in scope.
#[proc_macro_attribute]
pub fn allowed_phase(attr: TokenStream1, item: TokenStream1) -> TokenStream1 {
    let mut ast: syn::ImplItemFn = match syn::parse(item) {
        Ok(ast) => ast,
        Err(err) => return err.to_compile_error().into(),
    };
    let phase: syn::Ident = match syn::parse(attr) {
        Ok(phase) => phase,
        Err(err) => return err.to_compile_error().into(),
    };

    let action = ast.sig.ident.to_string();
    let early_return: syn::Stmt =
        syn::parse2(phase_guard(&phase, &action)).expect("phase guard is a valid statement");
    ast.block.stmts.insert(0, early_return);
    ast.into_token_stream().into()
}

fn phase_guard(phase: &syn::Ident, action: &str) -> TokenStream2 {
    quote! {
        if self.phase() != RoundPhase::#phase {
            return Err(RoundError::WrongPhase {
                action: #action,
                expected: RoundPhase::#phase,
                actual: self.phase(),
            });
        }
    }
}
