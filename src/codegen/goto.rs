use proc_macro2::{Literal, TokenStream};
use quote::quote;

use crate::codegen::Emitter;
use crate::error::Result;

/// Emit the direct-dispatch matcher: one arm per state with explicit
/// branches on byte ranges, each assigning the next state and falling
/// through to the spliced action bodies. The jump back to the dispatch is
/// the loop itself.
pub(crate) fn emit(e: &Emitter) -> Result<TokenStream> {
    let (p, p_end, cs, byte, is_eof) =
        (&e.p, &e.p_end, &e.cs, &e.byte, &e.is_eof);
    let escape = &e.escape;
    let read = e.read_byte();
    let on_error = e.hook(&e.config.on_error);

    let mut state_arms = Vec::new();
    for id in 1..=e.machine.state_count() as u32 {
        let id_lit = Literal::i32_suffixed(id as i32);
        let neg_lit = Literal::i32_suffixed(-(id as i32));
        let mut byte_arms = Vec::new();
        for edge in e.machine.edges(id) {
            let pattern = e.byte_pattern(edge);
            let actions = e.action_bodies(edge.actions())?;
            let target = Literal::i32_suffixed(edge.target() as i32);
            // The state advances before the action bodies run, so a body
            // can overwrite `cs` with a sentinel and the next dispatch
            // observes it.
            match e.guard_expr(edge.guard())? {
                Some(guard) => byte_arms.push(quote! {
                    #pattern if #guard => { #cs = #target; #actions }
                }),
                None => byte_arms.push(quote! {
                    #pattern => { #cs = #target; #actions }
                }),
            }
        }
        state_arms.push(quote! {
            #id_lit => match #byte {
                #(#byte_arms)*
                _ => {
                    #on_error
                    #cs = #neg_lit;
                    break #escape;
                }
            },
        });
    }

    let eof = e.eof_block()?;
    let init = e.hook(&e.config.init);
    let on_loop = e.hook(&e.config.on_loop);
    let on_return = e.hook(&e.config.on_return);

    Ok(quote! {
        #init
        #escape: loop {
            while #p <= #p_end {
                let #byte = #read;
                match #cs {
                    #(#state_arms)*
                    _ => break #escape,
                }
                #p += 1;
                #on_loop
            }
            if #is_eof && #cs > 0 {
                #eof
            }
            break #escape;
        }
        #on_return
    })
}
